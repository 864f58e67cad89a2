//! Breadth-first path search over stored relations.

use rusqlite::Connection;
use std::collections::{HashMap, HashSet, VecDeque};

use super::rows;
use crate::error::Result;
use crate::graph::Relation;

/// Shortest path from `source` to `target` within `max_depth` hops.
///
/// Relations are followed in both directions. Returns the entity ids along
/// the path (both ends included) and the relation used for each hop.
pub(crate) fn shortest_path(
    conn: &Connection,
    source: &str,
    target: &str,
    max_depth: usize,
) -> Result<Option<(Vec<String>, Vec<Relation>)>> {
    if source == target {
        return Ok(Some((vec![source.to_string()], Vec::new())));
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    // entity -> (previous entity, relation that reached it)
    let mut parents: HashMap<String, (String, Relation)> = HashMap::new();

    queue.push_back((source.to_string(), 0));
    visited.insert(source.to_string());

    while let Some((entity, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for relation in rows::relations_touching(conn, &entity, &[])? {
            let next = if relation.source_entity_id == entity {
                relation.target_entity_id.clone()
            } else {
                relation.source_entity_id.clone()
            };
            if !visited.insert(next.clone()) {
                continue;
            }

            parents.insert(next.clone(), (entity.clone(), relation));
            if next == target {
                return Ok(Some(unwind(parents, source, target)));
            }
            queue.push_back((next, depth + 1));
        }
    }

    Ok(None)
}

fn unwind(
    mut parents: HashMap<String, (String, Relation)>,
    source: &str,
    target: &str,
) -> (Vec<String>, Vec<Relation>) {
    let mut ids = vec![target.to_string()];
    let mut relations = Vec::new();
    let mut current = target.to_string();

    while current != source {
        let Some((previous, relation)) = parents.remove(&current) else {
            break;
        };
        relations.push(relation);
        ids.push(previous.clone());
        current = previous;
    }

    ids.reverse();
    relations.reverse();
    (ids, relations)
}
