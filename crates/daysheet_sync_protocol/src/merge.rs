//! Deterministic row merge for conflicting producer pushes.

use daysheet_core::{Row, RowKey};
use std::collections::HashSet;

/// Merges a conflicting client payload with the server's current rows.
///
/// Server rows win on key collision and keep their order; rows present only
/// in the client payload are appended in client order. Duplicate client keys
/// collapse to the server copy, or to the first client occurrence when the
/// key is absent on the server.
///
/// The result covers exactly the key union: every key in the server set
/// appears with the server's values, every client-only key appears with the
/// client's values, and no key appears twice.
pub fn merge_rows(server: &[Row], client: &[Row]) -> Vec<Row> {
    let server_keys: HashSet<RowKey> = server.iter().map(Row::key).collect();

    let mut merged: Vec<Row> = server.to_vec();
    let mut appended: HashSet<RowKey> = HashSet::new();

    for row in client {
        let key = row.key();
        if server_keys.contains(&key) || !appended.insert(key) {
            continue;
        }
        merged.push(row.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn row(site: &str, resv: &str, memo: &str) -> Row {
        Row {
            site: site.into(),
            reservation_date: resv.into(),
            manage_memo: if memo.is_empty() {
                Vec::new()
            } else {
                vec![memo.into()]
            },
            ..Row::default()
        }
    }

    #[test]
    fn server_wins_on_collision() {
        let server = vec![row("A1", "9/7", "server memo")];
        let client = vec![row("A1", "9/7", "client memo"), row("B2", "9/8", "")];

        let merged = merge_rows(&server, &client);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].manage_memo, vec!["server memo"]);
        assert_eq!(merged[1].site, "B2");
    }

    #[test]
    fn client_only_rows_keep_client_order() {
        let server = vec![row("A1", "9/7", "")];
        let client = vec![row("C3", "9/9", ""), row("B2", "9/8", "")];

        let merged = merge_rows(&server, &client);
        let sites: Vec<&str> = merged.iter().map(|r| r.site.as_str()).collect();
        assert_eq!(sites, vec!["A1", "C3", "B2"]);
    }

    #[test]
    fn duplicate_client_keys_collapse() {
        let server = vec![row("A1", "9/7", "kept")];
        let client = vec![
            row("A1", "9/7", "dupe-1"),
            row("A1", "9/7", "dupe-2"),
            row("B2", "9/8", "first"),
            row("B2", "9/8", "second"),
        ];

        let merged = merge_rows(&server, &client);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].manage_memo, vec!["kept"]);
        assert_eq!(merged[1].manage_memo, vec!["first"]);
    }

    #[test]
    fn empty_sides() {
        let rows = vec![row("A1", "9/7", "")];
        assert_eq!(merge_rows(&[], &rows), rows);
        assert_eq!(merge_rows(&rows, &[]), rows);
        assert!(merge_rows(&[], &[]).is_empty());
    }

    fn arb_row() -> impl Strategy<Value = Row> {
        // Small key alphabet to force plenty of collisions.
        ("[A-D]", "9/[1-4]", "[a-z]{0,6}")
            .prop_map(|(site, resv, memo)| row(&site, &resv, &memo))
    }

    proptest! {
        #[test]
        fn merge_law_holds(
            server in proptest::collection::vec(arb_row(), 0..8),
            client in proptest::collection::vec(arb_row(), 0..8),
        ) {
            // Deduplicate the server side: stores never hold duplicate keys.
            let mut seen = HashSet::new();
            let server: Vec<Row> = server
                .into_iter()
                .filter(|r| seen.insert(r.key()))
                .collect();

            let merged = merge_rows(&server, &client);

            let merged_map: HashMap<RowKey, &Row> =
                merged.iter().map(|r| (r.key(), r)).collect();

            // No key appears twice.
            prop_assert_eq!(merged_map.len(), merged.len());

            // Every server key keeps the server's values.
            for row in &server {
                prop_assert_eq!(*merged_map.get(&row.key()).unwrap(), row);
            }

            // Every client-only key is present.
            let server_keys: HashSet<RowKey> = server.iter().map(Row::key).collect();
            for row in &client {
                prop_assert!(merged_map.contains_key(&row.key()));
                if !server_keys.contains(&row.key()) {
                    let kept = merged_map.get(&row.key()).unwrap();
                    // First client occurrence wins among client duplicates.
                    let first = client.iter().find(|c| c.key() == row.key()).unwrap();
                    prop_assert_eq!(*kept, first);
                }
            }

            // |R| = |S ∪_key C|
            let mut union_keys = server_keys;
            union_keys.extend(client.iter().map(Row::key));
            prop_assert_eq!(merged.len(), union_keys.len());
        }
    }
}
