//! Bounding-box labels and their line-oriented text encoding.
//!
//! One label per line: `<class_name> <x_center> <y_center> <width> <height>`,
//! geometry as fractions of the image size with six decimals. Labels are
//! persisted by class *name*; the numeric id is resolved against the
//! taxonomy on every decode.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::taxonomy::ClassTaxonomy;

/// Minimum whitespace-separated tokens in a decodable line.
const MIN_LINE_TOKENS: usize = 5;

/// A single bounding box on one frame, in normalized geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub class_id: usize,
    pub class_name: String,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

/// A label as submitted by a client.
///
/// Either identity field may be omitted; `class_name` wins when both are set.
/// A name or id that does not exist in the taxonomy is rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelInput {
    #[serde(default)]
    pub class_id: Option<usize>,
    #[serde(default)]
    pub class_name: Option<String>,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelInput {
    /// Resolve the persisted class name and current id for this input.
    pub fn resolve(&self, taxonomy: &ClassTaxonomy) -> Result<Label, CoreError> {
        let (class_id, class_name) = match self.class_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                if name.chars().any(char::is_whitespace) {
                    return Err(CoreError::Validation(format!(
                        "class name '{name}' must not contain whitespace"
                    )));
                }
                let id = taxonomy.id_of(name).ok_or_else(|| {
                    CoreError::Validation(format!("class name '{name}' is not in the taxonomy"))
                })?;
                (id, name.to_string())
            }
            _ => {
                let id = self.class_id.unwrap_or(0);
                if id >= taxonomy.len() {
                    return Err(CoreError::Validation(format!(
                        "class_id {id} is out of range (taxonomy has {} classes)",
                        taxonomy.len()
                    )));
                }
                (id, taxonomy.name_of(id).to_string())
            }
        };

        let geometry = [self.x_center, self.y_center, self.width, self.height];
        if geometry.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::Validation(format!(
                "label geometry for '{class_name}' must be finite numbers"
            )));
        }

        Ok(Label {
            class_id,
            class_name,
            x_center: self.x_center,
            y_center: self.y_center,
            width: self.width,
            height: self.height,
        })
    }
}

/// Encode labels with their class name as the leading token.
pub fn encode_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|l| format_line(&l.class_name, l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Encode labels with the taxonomy index as the leading token.
///
/// This is the numeric-id export form; the stored artifact always uses names.
pub fn encode_labels_with_ids(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|l| format_line(&l.class_id.to_string(), l))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_line(token: &str, l: &Label) -> String {
    format!(
        "{token} {:.6} {:.6} {:.6} {:.6}",
        l.x_center, l.y_center, l.width, l.height
    )
}

/// Decode a label artifact, skipping lines that cannot be parsed.
///
/// Never fails. A class name missing from the taxonomy decodes to id 0 and is
/// logged, since an export by id would silently attribute it to class 0.
pub fn decode_labels(content: &str, taxonomy: &ClassTaxonomy) -> Vec<Label> {
    content
        .lines()
        .filter_map(|line| decode_line(line, taxonomy))
        .collect()
}

/// Decode a label artifact read as raw bytes.
///
/// Invalid UTF-8 is replaced rather than rejected, so a corrupt line is
/// skipped like any other malformed line.
pub fn decode_label_bytes(bytes: &[u8], taxonomy: &ClassTaxonomy) -> Vec<Label> {
    decode_labels(&String::from_utf8_lossy(bytes), taxonomy)
}

fn decode_line(line: &str, taxonomy: &ClassTaxonomy) -> Option<Label> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < MIN_LINE_TOKENS {
        return None;
    }

    let mut geometry = [0.0f64; 4];
    for (slot, raw) in geometry.iter_mut().zip(&parts[1..MIN_LINE_TOKENS]) {
        *slot = raw.parse().ok()?;
    }

    let class_name = parts[0];
    let class_id = taxonomy.id_of(class_name).unwrap_or_else(|| {
        tracing::warn!(class_name, "Label class not in taxonomy, defaulting to id 0");
        0
    });

    let [x_center, y_center, width, height] = geometry;
    Some(Label {
        class_id,
        class_name: class_name.to_string(),
        x_center,
        y_center,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn label(name: &str, id: usize, g: [f64; 4]) -> Label {
        Label {
            class_id: id,
            class_name: name.to_string(),
            x_center: g[0],
            y_center: g[1],
            width: g[2],
            height: g[3],
        }
    }

    #[test]
    fn encodes_fixed_precision_without_trailing_newline() {
        let encoded = encode_labels(&[
            label("car", 1, [0.5, 0.5, 0.2, 0.1]),
            label("dog", 11, [0.25, 0.75, 0.125, 0.0625]),
        ]);
        assert_eq!(
            encoded,
            "car 0.500000 0.500000 0.200000 0.100000\ndog 0.250000 0.750000 0.125000 0.062500"
        );
    }

    #[test]
    fn round_trip_preserves_names_and_geometry() {
        let taxonomy = ClassTaxonomy::default();
        let original = vec![
            label("person", 0, [0.123456, 0.654321, 0.1, 0.2]),
            label("truck", 4, [0.999999, 0.000001, 0.5, 0.5]),
        ];
        let decoded = decode_labels(&encode_labels(&original), &taxonomy);
        assert_eq!(decoded.len(), original.len());
        for (a, b) in original.iter().zip(&decoded) {
            assert_eq!(a.class_name, b.class_name);
            assert_eq!(a.class_id, b.class_id);
            assert!((a.x_center - b.x_center).abs() < 1e-6);
            assert!((a.y_center - b.y_center).abs() < 1e-6);
            assert!((a.width - b.width).abs() < 1e-6);
            assert!((a.height - b.height).abs() < 1e-6);
        }
    }

    #[test]
    fn short_lines_are_skipped() {
        let taxonomy = ClassTaxonomy::default();
        let decoded = decode_labels(
            "dog 0.1 0.2\ncat 0.1 0.2 0.3 0.4\n\n   \n",
            &taxonomy,
        );
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].class_name, "cat");
        assert_eq!(decoded[0].class_id, 10);
    }

    #[test]
    fn unparsable_geometry_is_skipped() {
        let taxonomy = ClassTaxonomy::default();
        let decoded = decode_labels("car a b c d\nbus 0.1 0.1 0.1 0.1", &taxonomy);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].class_name, "bus");
    }

    #[test]
    fn unknown_class_defaults_to_zero_but_keeps_name() {
        let taxonomy = ClassTaxonomy::default();
        let decoded = decode_labels("zebra 0.1 0.1 0.1 0.1", &taxonomy);
        assert_eq!(decoded[0].class_id, 0);
        assert_eq!(decoded[0].class_name, "zebra");
    }

    #[test]
    fn extra_tokens_are_ignored() {
        let taxonomy = ClassTaxonomy::default();
        let decoded = decode_labels("car 0.1 0.2 0.3 0.4 0.95 auto", &taxonomy);
        assert_eq!(decoded.len(), 1);
        assert!((decoded[0].height - 0.4).abs() < 1e-9);
    }

    #[test]
    fn id_encoding_replaces_leading_token() {
        let taxonomy = ClassTaxonomy::default();
        let decoded = decode_labels("car 0.500000 0.500000 0.200000 0.100000", &taxonomy);
        assert_eq!(
            encode_labels_with_ids(&decoded),
            "1 0.500000 0.500000 0.200000 0.100000"
        );
    }

    #[test]
    fn input_resolves_name_from_id() {
        let taxonomy = ClassTaxonomy::default();
        let input = LabelInput {
            class_id: Some(3),
            class_name: None,
            x_center: 0.5,
            y_center: 0.5,
            width: 0.1,
            height: 0.1,
        };
        let resolved = input.resolve(&taxonomy).unwrap();
        assert_eq!(resolved.class_name, "bus");
        assert_eq!(resolved.class_id, 3);
    }

    #[test]
    fn input_name_takes_precedence_over_id() {
        let taxonomy = ClassTaxonomy::default();
        let input = LabelInput {
            class_id: Some(3),
            class_name: Some("dog".into()),
            x_center: 0.5,
            y_center: 0.5,
            width: 0.1,
            height: 0.1,
        };
        assert_eq!(input.resolve(&taxonomy).unwrap().class_id, 11);
    }

    #[test]
    fn input_rejects_whitespace_names_and_nan() {
        let taxonomy = ClassTaxonomy::default();
        let spaced = LabelInput {
            class_id: None,
            class_name: Some("fire truck".into()),
            x_center: 0.5,
            y_center: 0.5,
            width: 0.1,
            height: 0.1,
        };
        assert_matches!(spaced.resolve(&taxonomy), Err(CoreError::Validation(_)));

        let nan = LabelInput {
            class_id: Some(0),
            class_name: None,
            x_center: f64::NAN,
            y_center: 0.5,
            width: 0.1,
            height: 0.1,
        };
        assert_matches!(nan.resolve(&taxonomy), Err(CoreError::Validation(_)));
    }

    #[test]
    fn input_rejects_classes_outside_taxonomy() {
        let taxonomy = ClassTaxonomy::default();
        let out_of_range = LabelInput {
            class_id: Some(99),
            class_name: None,
            x_center: 0.5,
            y_center: 0.5,
            width: 0.1,
            height: 0.1,
        };
        assert_matches!(
            out_of_range.resolve(&taxonomy),
            Err(CoreError::Validation(msg)) if msg.contains("99")
        );

        let unknown_name = LabelInput {
            class_id: Some(1),
            class_name: Some("giraffe".into()),
            ..out_of_range
        };
        assert_matches!(unknown_name.resolve(&taxonomy), Err(CoreError::Validation(_)));
    }

    #[test]
    fn invalid_utf8_lines_are_skipped() {
        let taxonomy = ClassTaxonomy::default();
        let decoded = decode_label_bytes(b"\xff\xfe 0.1 0.2 0.3\nbus 0.5 0.5 0.2 0.2\n", &taxonomy);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].class_id, 3);
    }
}
