use std::str::FromStr;

use nom::{
    character::complete::{char, space0, u32},
    combinator::{all_consuming, opt},
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

/// Errors in per-layer parameter strings
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParameterError {
    #[error("Wrong parameter group `{0}`: expected exactly one ':' between two ','")]
    WrongColonCount(String),
    #[error("Wrong layer range `{0}`: expected at most one '-'")]
    WrongHyphenCount(String),
    #[error("Invalid layer range `{0}`: expected `layer` or `first-last`")]
    InvalidRange(String),
    #[error("Layer range {begin}-{end} is reversed")]
    ReversedRange { begin: usize, end: usize },
    #[error("Layer {layer} is out of range, the detector has {nlayers} layers")]
    LayerOutOfRange { layer: usize, nlayers: usize },
    #[error("Invalid value `{value}` for layers {begin}-{end}")]
    InvalidValue {
        value: String,
        begin: usize,
        end: usize,
    },
}

/// A single `first-last:value` group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerRange<T> {
    /// First layer, inclusive
    pub begin: usize,
    /// Last layer, inclusive
    pub end: usize,
    /// Value assigned to all layers in the range
    pub value: T,
}

/// Parse a per-layer parameter string of the form
/// `"first-last:value,layer:value,..."`
///
/// Groups are returned in the order in which they appear. Layers are
/// not checked against the detector size, use [apply_layer_ranges] for
/// that.
pub fn parse_layer_ranges<T: FromStr>(
    s: &str,
) -> Result<Vec<LayerRange<T>>, ParameterError> {
    use ParameterError::*;

    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|group| {
            let parts: Vec<_> = group.split(':').collect();
            let [layers, value] = parts[..] else {
                return Err(WrongColonCount(group.to_owned()));
            };
            if layers.matches('-').count() > 1 {
                return Err(WrongHyphenCount(layers.to_owned()));
            }
            let (begin, end) = match layer_range(layers) {
                Ok((_, (begin, end))) => {
                    (begin as usize, end.unwrap_or(begin) as usize)
                }
                Err(_) => return Err(InvalidRange(layers.to_owned())),
            };
            if begin > end {
                return Err(ReversedRange { begin, end });
            }
            let value = value.trim().parse().map_err(|_| InvalidValue {
                value: value.to_owned(),
                begin,
                end,
            })?;
            Ok(LayerRange { begin, end, value })
        })
        .collect()
}

/// Overwrite the entries of `values` selected by the parameter string `s`
///
/// Groups are applied in order, so later groups take precedence where
/// ranges overlap. On error, `values` is left unchanged.
pub fn apply_layer_ranges<T: FromStr + Clone>(
    s: &str,
    values: &mut [T],
) -> Result<(), ParameterError> {
    let ranges = parse_layer_ranges::<T>(s)?;
    let nlayers = values.len();
    if let Some(r) = ranges.iter().find(|r| r.end >= nlayers) {
        return Err(ParameterError::LayerOutOfRange {
            layer: r.end,
            nlayers,
        });
    }
    for LayerRange { begin, end, value } in ranges {
        for v in &mut values[begin..=end] {
            *v = value.clone();
        }
    }
    Ok(())
}

fn layer_range(s: &str) -> IResult<&str, (u32, Option<u32>)> {
    all_consuming(delimited(
        space0,
        pair(
            u32,
            opt(preceded(delimited(space0, char('-'), space0), u32)),
        ),
        space0,
    ))(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let mut v = vec![1u32; 4];
        apply_layer_ranges("", &mut v).unwrap();
        apply_layer_ranges("  ", &mut v).unwrap();
        assert_eq!(v, [1; 4]);
    }

    #[test]
    fn ranges() {
        let mut v = vec![0.1f64; 6];
        apply_layer_ranges("0-2:0.5, 4:2", &mut v).unwrap();
        assert_eq!(v, [0.5, 0.5, 0.5, 0.1, 2., 0.1]);
    }

    #[test]
    fn overlap_follows_string_order() {
        let mut v = vec![0u32; 4];
        apply_layer_ranges("0-2:5,1:9", &mut v).unwrap();
        assert_eq!(v, [5, 9, 5, 0]);

        let mut v = vec![0u32; 4];
        apply_layer_ranges("1:9,0-2:5", &mut v).unwrap();
        assert_eq!(v, [5, 5, 5, 0]);
    }

    #[test]
    fn disjoint_groups_commute() {
        let mut v1 = vec![25u32; 10];
        let mut v2 = v1.clone();
        apply_layer_ranges("0-3:30,5:10,7-9:40", &mut v1).unwrap();
        apply_layer_ranges("7-9:40,0-3:30,5:10", &mut v2).unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn malformed() {
        use ParameterError::*;
        let mut v = vec![0u32; 10];
        assert!(matches!(
            apply_layer_ranges("0-2", &mut v),
            Err(WrongColonCount(_))
        ));
        assert!(matches!(
            apply_layer_ranges("0:1:2", &mut v),
            Err(WrongColonCount(_))
        ));
        assert!(matches!(
            apply_layer_ranges("0:1,", &mut v),
            Err(WrongColonCount(_))
        ));
        assert!(matches!(
            apply_layer_ranges("0-1-2:3", &mut v),
            Err(WrongHyphenCount(_))
        ));
        assert!(matches!(
            apply_layer_ranges("a:3", &mut v),
            Err(InvalidRange(_))
        ));
        assert!(matches!(
            apply_layer_ranges("1:x", &mut v),
            Err(InvalidValue { .. })
        ));
        assert_eq!(
            apply_layer_ranges("5-2:1", &mut v),
            Err(ReversedRange { begin: 5, end: 2 })
        );
        assert_eq!(v, [0; 10]);
    }

    #[test]
    fn out_of_range() {
        let mut v = vec![0u32; 10];
        assert_eq!(
            apply_layer_ranges("0:1,8-10:2", &mut v),
            Err(ParameterError::LayerOutOfRange {
                layer: 10,
                nlayers: 10
            })
        );
        assert_eq!(v, [0; 10]);
    }
}
