//! Persists a trained forest as a structured, human-inspectable JSON
//! document and reads it back. Loading validates the document instead of
//! trusting it: truncated or malformed files, impossible leaf probabilities
//! and out-of-range feature indices are all rejected.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::forest::Forest;
use crate::tree::Tree;
use crate::LabelColors;

#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    window_radius: u32,
    max_tree_depth: u32,
    testobject_tries: u32,
    forest_size: u32,
    colors: LabelColors,
    trees: Vec<Tree>,
}

impl ModelDocument {
    fn from_forest(forest: &Forest) -> ModelDocument {
        ModelDocument {
            window_radius: forest.window_radius,
            max_tree_depth: forest.max_tree_depth,
            testobject_tries: forest.testobject_tries,
            forest_size: forest.trees.len() as u32,
            colors: forest.colors,
            trees: forest.trees.clone(),
        }
    }

    fn into_forest(self) -> Result<Forest> {
        if self.trees.is_empty() {
            return Err(Error::Serialization("model contains no trees".into()));
        }
        if self.trees.len() != self.forest_size as usize {
            return Err(Error::Serialization(format!(
                "model declares {} trees but contains {}",
                self.forest_size,
                self.trees.len()
            )));
        }
        let side = (2 * self.window_radius + 1) as usize;
        let feature_len = side * side;
        for tree in &self.trees {
            tree.root().validate(feature_len)?;
        }
        Ok(Forest {
            trees: self.trees,
            window_radius: self.window_radius,
            max_tree_depth: self.max_tree_depth,
            testobject_tries: self.testobject_tries,
            colors: self.colors,
        })
    }
}

pub fn to_json_string(forest: &Forest) -> Result<String> {
    serde_json::to_string_pretty(&ModelDocument::from_forest(forest))
        .map_err(|e| Error::Serialization(e.to_string()))
}

pub fn from_json_str(text: &str) -> Result<Forest> {
    let document: ModelDocument =
        serde_json::from_str(text).map_err(|e| Error::Serialization(e.to_string()))?;
    document.into_forest()
}

pub fn save(forest: &Forest, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &ModelDocument::from_forest(forest))
        .map_err(|e| Error::Serialization(e.to_string()))
}

pub fn load(path: &Path) -> Result<Forest> {
    let reader = BufReader::new(File::open(path)?);
    let document: ModelDocument =
        serde_json::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))?;
    document.into_forest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, SplitTest};

    fn toy_forest() -> Forest {
        let tree = Tree::from_root(Node::Split {
            test: SplitTest::Difference {
                first: 0,
                second: 8,
                threshold: -3,
            },
            when_true: Box::new(Node::Leaf { probability: 0.125 }),
            when_false: Box::new(Node::Split {
                test: SplitTest::Value {
                    index: 4,
                    threshold: 200,
                },
                when_true: Box::new(Node::Leaf { probability: 0.75 }),
                when_false: Box::new(Node::Leaf {
                    probability: 0.333333333333333,
                }),
            }),
        });
        Forest {
            trees: vec![tree.clone(), tree],
            window_radius: 1,
            max_tree_depth: 4,
            testobject_tries: 100,
            colors: LabelColors {
                background: 85,
                foreground: 170,
            },
        }
    }

    #[test]
    fn round_trip_reproduces_the_forest() {
        let forest = toy_forest();
        let text = to_json_string(&forest).unwrap();
        let restored = from_json_str(&text).unwrap();
        assert_eq!(forest, restored);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            from_json_str("this is not json"),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            from_json_str("{\"window_radius\": 1}"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn truncated_document_is_rejected() {
        let text = to_json_string(&toy_forest()).unwrap();
        let truncated = &text[..text.len() / 2];
        assert!(matches!(
            from_json_str(truncated),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn wrong_tree_count_is_rejected() {
        let mut text = to_json_string(&toy_forest()).unwrap();
        text = text.replace("\"forest_size\": 2", "\"forest_size\": 3");
        assert!(matches!(from_json_str(&text), Err(Error::Serialization(_))));
    }

    #[test]
    fn out_of_range_leaf_probability_is_rejected() {
        let mut forest = toy_forest();
        forest.trees[0] = Tree::from_root(Node::Leaf { probability: 2.0 });
        let text = to_json_string(&forest).unwrap();
        assert!(matches!(from_json_str(&text), Err(Error::Serialization(_))));
    }

    #[test]
    fn feature_index_outside_window_is_rejected() {
        let mut forest = toy_forest();
        // Radius 1 means 9 features; index 9 is out of range.
        forest.trees[0] = Tree::from_root(Node::Split {
            test: SplitTest::Value {
                index: 9,
                threshold: 0,
            },
            when_true: Box::new(Node::Leaf { probability: 0.0 }),
            when_false: Box::new(Node::Leaf { probability: 1.0 }),
        });
        let text = to_json_string(&forest).unwrap();
        assert!(matches!(from_json_str(&text), Err(Error::Serialization(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load(Path::new("/nonexistent/forest.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
