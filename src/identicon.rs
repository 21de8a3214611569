//! Identicon - Deterministic Seed Image
//!
//! Maps a seed string (a wallet signature in practice) to a 16x16 grid of
//! colors and renders it as a 256x256 SVG. Output must stay byte-identical
//! with images already pinned to storage, so the sampling window, channel
//! multipliers and markup below are frozen.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Cells per side.
pub const GRID_SIZE: usize = 16;
/// Pixel size of one cell in the rendered document.
pub const CELL_SIZE: usize = 16;
/// Width and height of the rendered canvas.
pub const CANVAS_SIZE: usize = GRID_SIZE * CELL_SIZE;
/// Number of leading code units sampled from the seed. A `0x`-prefixed
/// 65-byte signature is exactly this long.
pub const SAMPLE_WINDOW: usize = 132;

pub const DATA_URI_PREFIX: &str = "data:image/svg+xml;base64,";

const SVG_OPEN: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256">"#;
const SVG_CLOSE: &str = "</svg>";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdenticonError {
    #[error("Seed is empty")]
    EmptySeed,

    #[error("Seed too short: {actual} code units, {required} required")]
    InvalidSeedLength { actual: usize, required: usize },

    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),

    #[error("Unknown short seed policy: {0}")]
    UnknownPolicy(String),
}

/// What to do when the seed has fewer than [`SAMPLE_WINDOW`] code units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortSeedPolicy {
    /// Refuse to render.
    #[default]
    Reject,
    /// Sample at `pos % seed_len` instead.
    Wrap,
}

impl ShortSeedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortSeedPolicy::Reject => "reject",
            ShortSeedPolicy::Wrap => "wrap",
        }
    }
}

impl FromStr for ShortSeedPolicy {
    type Err = IdenticonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(ShortSeedPolicy::Reject),
            "wrap" => Ok(ShortSeedPolicy::Wrap),
            other => Err(IdenticonError::UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ShortSeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Derive all three channels from a single UTF-16 code unit.
    pub fn from_code_unit(c: u16) -> Self {
        let c = u32::from(c);
        Self {
            red: ((c * 17) % 256) as u8,
            green: ((c * 31) % 256) as u8,
            blue: ((c * 71) % 256) as u8,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// 16x16 cells, indexed `[x][y]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [[Rgb; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        self.cells.get(x).and_then(|column| column.get(y)).copied()
    }

    /// Cells in emission order: `x` outer, `y` inner.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Rgb)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(x, column)| column.iter().enumerate().map(move |(y, rgb)| (x, y, *rgb)))
    }

    pub fn distinct_colors(&self) -> usize {
        let mut seen: Vec<Rgb> = self.iter().map(|(_, _, rgb)| rgb).collect();
        seen.sort_by_key(|c| (c.red, c.green, c.blue));
        seen.dedup();
        seen.len()
    }
}

/// Sample position of cell `(x, y)` inside the seed window.
fn sample_position(x: usize, y: usize) -> usize {
    (x * GRID_SIZE + y) % SAMPLE_WINDOW
}

/// Build the color grid for `seed`.
pub fn generate_grid(seed: &str, policy: ShortSeedPolicy) -> Result<Grid, IdenticonError> {
    // Positions never exceed the window, so nothing past it is needed.
    let units: Vec<u16> = seed.encode_utf16().take(SAMPLE_WINDOW).collect();
    if units.is_empty() {
        return Err(IdenticonError::EmptySeed);
    }
    if units.len() < SAMPLE_WINDOW && policy == ShortSeedPolicy::Reject {
        return Err(IdenticonError::InvalidSeedLength {
            actual: units.len(),
            required: SAMPLE_WINDOW,
        });
    }

    let mut cells = [[Rgb::default(); GRID_SIZE]; GRID_SIZE];
    for (x, column) in cells.iter_mut().enumerate() {
        for (y, cell) in column.iter_mut().enumerate() {
            let pos = sample_position(x, y) % units.len();
            *cell = Rgb::from_code_unit(units[pos]);
        }
    }

    Ok(Grid { cells })
}

/// SVG markup for a grid.
pub struct SvgDocument<'a>(pub &'a Grid);

impl fmt::Display for SvgDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SVG_OPEN)?;
        for (x, y, rgb) in self.0.iter() {
            write!(
                f,
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}" />"#,
                x * CELL_SIZE,
                y * CELL_SIZE,
                CELL_SIZE,
                CELL_SIZE,
                rgb
            )?;
        }
        f.write_str(SVG_CLOSE)
    }
}

pub fn grid_to_svg(grid: &Grid) -> String {
    SvgDocument(grid).to_string()
}

/// Render `seed` with the default (strict) policy.
pub fn generate(seed: &str) -> Result<String, IdenticonError> {
    generate_with_policy(seed, ShortSeedPolicy::default())
}

pub fn generate_with_policy(seed: &str, policy: ShortSeedPolicy) -> Result<String, IdenticonError> {
    debug!(seed_units = seed.encode_utf16().count(), %policy, "generating identicon");
    let grid = generate_grid(seed, policy)?;
    Ok(grid_to_svg(&grid))
}

/// Wrap an SVG document as a base64 data URI.
pub fn to_data_uri(svg: &str) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(svg.as_bytes()))
}

pub fn decode_data_uri(uri: &str) -> Result<String, IdenticonError> {
    let payload = uri
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| IdenticonError::MalformedDataUri("expected an SVG base64 data URI".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| IdenticonError::MalformedDataUri(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IdenticonError::MalformedDataUri(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_count(svg: &str) -> usize {
        svg.matches("<rect ").count()
    }

    fn ascending_seed() -> String {
        (0..SAMPLE_WINDOW as u32).map(|i| char::from_u32(0x30 + i).unwrap()).collect()
    }

    #[test]
    fn test_uniform_seed_color() {
        let seed = "a".repeat(SAMPLE_WINDOW);
        let svg = generate(&seed).unwrap();
        assert_eq!(rect_count(&svg), 256);
        assert_eq!(svg.matches(r#"fill="rgb(113, 191, 231)""#).count(), 256);
    }

    #[test]
    fn test_single_char_seed_wraps_to_uniform_grid() {
        let svg = generate_with_policy("a", ShortSeedPolicy::Wrap).unwrap();
        assert_eq!(svg.matches(r#"fill="rgb(113, 191, 231)""#).count(), 256);
        assert_eq!(svg, generate(&"a".repeat(SAMPLE_WINDOW)).unwrap());
    }

    #[test]
    fn test_exact_markup() {
        let seed = "a".repeat(SAMPLE_WINDOW);
        let svg = generate(&seed).unwrap();
        assert!(svg.starts_with(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256"><rect x="0" y="0" width="16" height="16" fill="rgb(113, 191, 231)" /><rect x="0" y="16" "#
        ));
        assert!(svg.ends_with(r#"<rect x="240" y="240" width="16" height="16" fill="rgb(113, 191, 231)" /></svg>"#));
    }

    #[test]
    fn test_ascending_seed_not_degenerate() {
        let grid = generate_grid(&ascending_seed(), ShortSeedPolicy::Reject).unwrap();
        assert!(grid.distinct_colors() >= 2);
    }

    #[test]
    fn test_sampling_window_wraps_at_132() {
        // Cell (8, 4) samples position 132 % 132 == 0.
        let grid = generate_grid(&ascending_seed(), ShortSeedPolicy::Reject).unwrap();
        assert_eq!(grid.get(8, 4), grid.get(0, 0));
        assert_ne!(grid.get(8, 3), grid.get(0, 0));
    }

    #[test]
    fn test_chars_past_window_ignored() {
        let base = "b".repeat(SAMPLE_WINDOW);
        let extended = format!("{}zzzz", base);
        assert_eq!(generate(&base).unwrap(), generate(&extended).unwrap());
    }

    #[test]
    fn test_single_char_change_changes_output() {
        let base = "c".repeat(SAMPLE_WINDOW);
        let mut changed: Vec<char> = base.chars().collect();
        changed[57] = 'd';
        let changed: String = changed.into_iter().collect();
        assert_ne!(generate(&base).unwrap(), generate(&changed).unwrap());
    }

    #[test]
    fn test_channels_use_code_units() {
        // U+1F600 is a surrogate pair; only the high surrogate 0xD83D is sampled at pos 0.
        let seed = format!("\u{1F600}{}", "a".repeat(SAMPLE_WINDOW));
        let grid = generate_grid(&seed, ShortSeedPolicy::Reject).unwrap();
        assert_eq!(grid.get(0, 0), Some(Rgb::from_code_unit(0xD83D)));
        assert_eq!(grid.get(0, 1), Some(Rgb::from_code_unit(0xDE00)));
    }

    #[test]
    fn test_short_seed_rejected() {
        let err = generate("0xabc").unwrap_err();
        assert_eq!(err, IdenticonError::InvalidSeedLength { actual: 5, required: SAMPLE_WINDOW });
    }

    #[test]
    fn test_short_seed_wraps() {
        let grid = generate_grid("ab", ShortSeedPolicy::Wrap).unwrap();
        let a = Rgb::from_code_unit(u16::from(b'a'));
        let b = Rgb::from_code_unit(u16::from(b'b'));
        assert_eq!(grid.get(0, 0), Some(a));
        assert_eq!(grid.get(0, 1), Some(b));
        assert_eq!(grid.get(0, 2), Some(a));
        assert_eq!(grid.distinct_colors(), 2);
    }

    #[test]
    fn test_wrap_matches_reject_for_full_seeds() {
        let seed = ascending_seed();
        assert_eq!(
            generate_with_policy(&seed, ShortSeedPolicy::Wrap).unwrap(),
            generate_with_policy(&seed, ShortSeedPolicy::Reject).unwrap()
        );
    }

    #[test]
    fn test_empty_seed_always_fails() {
        assert_eq!(generate_with_policy("", ShortSeedPolicy::Wrap), Err(IdenticonError::EmptySeed));
        assert_eq!(generate(""), Err(IdenticonError::EmptySeed));
    }

    #[test]
    fn test_data_uri_round_trip() {
        let svg = generate(&"e".repeat(SAMPLE_WINDOW)).unwrap();
        let uri = to_data_uri(&svg);
        assert!(uri.starts_with(DATA_URI_PREFIX));
        assert_eq!(decode_data_uri(&uri).unwrap(), svg);
    }

    #[test]
    fn test_data_uri_wrong_prefix() {
        assert!(matches!(
            decode_data_uri("data:image/png;base64,AAAA"),
            Err(IdenticonError::MalformedDataUri(_))
        ));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("wrap".parse::<ShortSeedPolicy>().unwrap(), ShortSeedPolicy::Wrap);
        assert!("clamp".parse::<ShortSeedPolicy>().is_err());
    }
}
