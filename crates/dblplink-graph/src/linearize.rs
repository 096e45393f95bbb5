//! Neighborhood linearization.
//!
//! Rows become `"subject — predicate — object"` evidence lines. A row is
//! dropped whole if its subject or object is an anonymous node, or if any
//! part is missing or blank after trimming.

use dblplink_core::{Neighborhood, NeighborhoodRow, NeighborhoodTriple};

/// Marker identifying blank nodes in SPARQL label bindings.
pub const ANONYMOUS_NODE_MARKER: &str = "_:bn";

/// Convert one row into a complete triple, or `None` if it must be dropped.
pub fn to_triple(row: &NeighborhoodRow) -> Option<NeighborhoodTriple> {
    let (subject, predicate, object) = row.parts();
    let subject = subject.unwrap_or_default().trim();
    let predicate = predicate.unwrap_or_default().trim();
    let object = object.unwrap_or_default().trim();

    if subject.contains(ANONYMOUS_NODE_MARKER) || object.contains(ANONYMOUS_NODE_MARKER) {
        return None;
    }
    if subject.is_empty() || predicate.is_empty() || object.is_empty() {
        return None;
    }

    Some(NeighborhoodTriple {
        subject: subject.to_string(),
        predicate: predicate.to_string(),
        object: object.to_string(),
    })
}

/// Linearize outgoing rows then incoming rows, each in fetch order.
///
/// No deduplication is applied.
pub fn linearize(outgoing: &[NeighborhoodRow], incoming: &[NeighborhoodRow]) -> Vec<String> {
    outgoing
        .iter()
        .chain(incoming)
        .filter_map(to_triple)
        .map(|triple| triple.to_string())
        .collect()
}

/// Linearize both directions of a fetched neighborhood.
pub fn linearize_neighborhood(neighborhood: &Neighborhood) -> Vec<String> {
    linearize(&neighborhood.outgoing, &neighborhood.incoming)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(s: Option<&str>, p: Option<&str>, o: Option<&str>) -> NeighborhoodRow {
        NeighborhoodRow::Outgoing {
            subject_label: s.map(String::from),
            predicate: p.map(String::from),
            object_label: o.map(String::from),
        }
    }

    fn inc(s: Option<&str>, p: Option<&str>, o: Option<&str>) -> NeighborhoodRow {
        NeighborhoodRow::Incoming {
            subject_label: s.map(String::from),
            predicate_label: p.map(String::from),
            object_label: o.map(String::from),
        }
    }

    #[test]
    fn test_complete_row_is_rendered() {
        let lines = linearize(
            &[out(
                Some("Chris Biemann"),
                Some("https://dblp.org/rdf/schema#orcid"),
                Some("0000-0002-8449-9624"),
            )],
            &[],
        );
        assert_eq!(
            lines,
            vec!["Chris Biemann — https://dblp.org/rdf/schema#orcid — 0000-0002-8449-9624"]
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let triple = to_triple(&out(Some("  a "), Some("\tp"), Some("o\n"))).unwrap();
        assert_eq!(triple.to_string(), "a — p — o");
    }

    #[test]
    fn test_incomplete_rows_dropped() {
        let rows = vec![
            out(None, Some("p"), Some("o")),
            out(Some("s"), None, Some("o")),
            out(Some("s"), Some("p"), None),
            out(Some("   "), Some("p"), Some("o")),
            out(Some("s"), Some(""), Some("o")),
        ];
        assert!(linearize(&rows, &[]).is_empty());
    }

    #[test]
    fn test_anonymous_nodes_never_appear() {
        let rows = vec![
            out(Some("_:bn12"), Some("p"), Some("o")),
            out(Some("s"), Some("p"), Some("node _:bn4 label")),
            inc(Some("_:bn1"), Some("authored by"), Some("_:bn2")),
            inc(Some("s"), Some("authored by"), Some("o")),
        ];
        let lines = linearize(&rows[..2], &rows[2..]);
        assert_eq!(lines, vec!["s — authored by — o"]);
        assert!(lines.iter().all(|l| !l.contains(ANONYMOUS_NODE_MARKER)));
    }

    #[test]
    fn test_anonymous_marker_in_predicate_is_kept() {
        // Only subject and object are checked for blank nodes.
        let lines = linearize(&[out(Some("s"), Some("_:bnp"), Some("o"))], &[]);
        assert_eq!(lines, vec!["s — _:bnp — o"]);
    }

    #[test]
    fn test_outgoing_before_incoming_in_fetch_order() {
        let outgoing = vec![
            out(Some("A"), Some("p1"), Some("x")),
            out(Some("A"), Some("p2"), Some("y")),
        ];
        let incoming = vec![
            inc(Some("P1"), Some("authored by"), Some("A")),
            inc(Some("P2"), Some("authored by"), Some("A")),
        ];
        let lines = linearize(&outgoing, &incoming);
        assert_eq!(
            lines,
            vec![
                "A — p1 — x",
                "A — p2 — y",
                "P1 — authored by — A",
                "P2 — authored by — A",
            ]
        );
    }

    #[test]
    fn test_duplicates_kept() {
        let row = out(Some("A"), Some("p"), Some("x"));
        let lines = linearize(&[row.clone(), row], &[]);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_linearize_neighborhood_matches_linearize() {
        let hood = Neighborhood {
            outgoing: vec![out(Some("A"), Some("p"), Some("x"))],
            incoming: vec![inc(Some("B"), Some("q"), Some("A"))],
        };
        assert_eq!(
            linearize_neighborhood(&hood),
            linearize(&hood.outgoing, &hood.incoming)
        );
    }
}
