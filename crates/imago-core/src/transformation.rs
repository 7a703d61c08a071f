//! Image transformation spec
//!
//! An immutable, validated description of one rendering of an image:
//! dimensions, fit, gravity, output format, quality, and effects. Specs are
//! constructed through a fluent builder; every field is validated against
//! its closed domain when `build()` runs, and an out-of-range or unknown
//! value is rejected with the offending field named — never clamped.
//!
//! `params()` yields the canonical key=value pairs the URL compiler emits:
//! sorted key order, values equal to the documented defaults omitted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::AppError;

// Documented remote-side defaults; params equal to these are not emitted.
const DEFAULT_QUALITY: u8 = 85;

/// Resize behavior when the image does not match the requested box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Fit {
    ScaleDown,
    Contain,
    Cover,
    Crop,
    Pad,
}

impl Display for Fit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Fit::ScaleDown => write!(f, "scale-down"),
            Fit::Contain => write!(f, "contain"),
            Fit::Cover => write!(f, "cover"),
            Fit::Crop => write!(f, "crop"),
            Fit::Pad => write!(f, "pad"),
        }
    }
}

impl FromStr for Fit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scale-down" => Ok(Fit::ScaleDown),
            "contain" => Ok(Fit::Contain),
            "cover" => Ok(Fit::Cover),
            "crop" => Ok(Fit::Crop),
            "pad" => Ok(Fit::Pad),
            _ => Err(AppError::validation("fit", format!("unknown fit mode: {}", s))),
        }
    }
}

/// Which part of the image to keep when cropping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gravity {
    Auto,
    Center,
    Top,
    Bottom,
    Left,
    Right,
    /// Named focal point defined on the remote side (e.g. "face").
    Named(String),
}

impl Display for Gravity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Gravity::Auto => write!(f, "auto"),
            Gravity::Center => write!(f, "center"),
            Gravity::Top => write!(f, "top"),
            Gravity::Bottom => write!(f, "bottom"),
            Gravity::Left => write!(f, "left"),
            Gravity::Right => write!(f, "right"),
            Gravity::Named(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for Gravity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Gravity::Auto),
            "center" => Ok(Gravity::Center),
            "top" => Ok(Gravity::Top),
            "bottom" => Ok(Gravity::Bottom),
            "left" => Ok(Gravity::Left),
            "right" => Ok(Gravity::Right),
            name if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(Gravity::Named(name.to_string()))
            }
            _ => Err(AppError::validation(
                "gravity",
                format!("invalid gravity: {:?}", s),
            )),
        }
    }
}

/// Output encoding of the delivered image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Auto,
    Webp,
    Avif,
    Json,
    Jpeg,
    Png,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutputFormat::Auto => write!(f, "auto"),
            OutputFormat::Webp => write!(f, "webp"),
            OutputFormat::Avif => write!(f, "avif"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(OutputFormat::Auto),
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            "json" => Ok(OutputFormat::Json),
            "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(AppError::validation(
                "format",
                format!("unknown output format: {}", s),
            )),
        }
    }
}

/// Border drawn around the delivered image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Border {
    pub width: u32,
    pub color: String,
}

/// Pixels trimmed from each edge before other operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trim {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Immutable, validated description of an image rendering.
///
/// Construct through [`TransformationSpec::builder`]; a spec that exists
/// has already passed validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransformationSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<Fit>,
    pub gravity: Option<Gravity>,
    pub format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub blur: Option<u16>,
    pub sharpen: Option<u8>,
    pub rotate: Option<u16>,
    pub background: Option<String>,
    pub border: Option<Border>,
    pub trim: Option<Trim>,
}

impl TransformationSpec {
    pub fn builder() -> TransformationSpecBuilder {
        TransformationSpecBuilder::default()
    }

    /// An identity spec: no transformation parameters at all.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Canonical key=value pairs in fixed sorted order.
    ///
    /// Only parameters that differ from the documented defaults are
    /// emitted, keeping output stable across library versions.
    pub fn params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        if let Some(width) = self.width {
            params.insert("w", width.to_string());
        }
        if let Some(height) = self.height {
            params.insert("h", height.to_string());
        }
        if let Some(fit) = self.fit {
            if fit != Fit::ScaleDown {
                params.insert("fit", fit.to_string());
            }
        }
        if let Some(ref gravity) = self.gravity {
            if *gravity != Gravity::Auto {
                params.insert("gravity", gravity.to_string());
            }
        }
        if let Some(format) = self.format {
            if format != OutputFormat::Auto {
                params.insert("format", format.to_string());
            }
        }
        if let Some(quality) = self.quality {
            if quality != DEFAULT_QUALITY {
                params.insert("quality", quality.to_string());
            }
        }
        if let Some(blur) = self.blur {
            if blur != 0 {
                params.insert("blur", blur.to_string());
            }
        }
        if let Some(sharpen) = self.sharpen {
            if sharpen != 0 {
                params.insert("sharpen", sharpen.to_string());
            }
        }
        if let Some(rotate) = self.rotate {
            if rotate != 0 {
                params.insert("rotate", rotate.to_string());
            }
        }
        if let Some(ref background) = self.background {
            params.insert("background", background.clone());
        }
        if let Some(ref border) = self.border {
            params.insert("border", format!("{},{}", border.width, border.color));
        }
        if let Some(ref trim) = self.trim {
            params.insert(
                "trim",
                format!("{};{};{};{}", trim.top, trim.right, trim.bottom, trim.left),
            );
        }
        params
    }
}

/// Fluent builder for [`TransformationSpec`].
///
/// Setters accumulate raw values; `build()` validates every field against
/// its declared domain and returns the first violation.
#[derive(Debug, Clone, Default)]
pub struct TransformationSpecBuilder {
    width: Option<u32>,
    height: Option<u32>,
    fit: Option<Fit>,
    gravity: Option<Gravity>,
    format: Option<OutputFormat>,
    quality: Option<u8>,
    blur: Option<u16>,
    sharpen: Option<u8>,
    rotate: Option<u16>,
    background: Option<String>,
    border: Option<(u32, String)>,
    trim: Option<Trim>,
}

impl TransformationSpecBuilder {
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn fit(mut self, fit: Fit) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = Some(gravity);
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Quality from 1 to 100.
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Blur radius from 0 to 250.
    pub fn blur(mut self, blur: u16) -> Self {
        self.blur = Some(blur);
        self
    }

    /// Sharpen strength from 0 to 10.
    pub fn sharpen(mut self, sharpen: u8) -> Self {
        self.sharpen = Some(sharpen);
        self
    }

    /// Rotation in degrees: 0, 90, 180, or 270.
    pub fn rotate(mut self, angle: u16) -> Self {
        self.rotate = Some(angle);
        self
    }

    /// Background fill color as a hex value, e.g. `#ffffff`.
    pub fn background(mut self, color: &str) -> Self {
        self.background = Some(color.to_string());
        self
    }

    pub fn border(mut self, width: u32, color: &str) -> Self {
        self.border = Some((width, color.to_string()));
        self
    }

    pub fn trim(mut self, top: u32, right: u32, bottom: u32, left: u32) -> Self {
        self.trim = Some(Trim {
            top,
            right,
            bottom,
            left,
        });
        self
    }

    /// Validate every field and produce the immutable spec.
    pub fn build(self) -> Result<TransformationSpec, AppError> {
        if let Some(width) = self.width {
            if width == 0 {
                return Err(AppError::validation("width", "must be a positive integer"));
            }
        }
        if let Some(height) = self.height {
            if height == 0 {
                return Err(AppError::validation("height", "must be a positive integer"));
            }
        }
        if let Some(quality) = self.quality {
            if !(1..=100).contains(&quality) {
                return Err(AppError::validation(
                    "quality",
                    format!("must be between 1 and 100, got {}", quality),
                ));
            }
        }
        if let Some(blur) = self.blur {
            if blur > 250 {
                return Err(AppError::validation(
                    "blur",
                    format!("must be between 0 and 250, got {}", blur),
                ));
            }
        }
        if let Some(sharpen) = self.sharpen {
            if sharpen > 10 {
                return Err(AppError::validation(
                    "sharpen",
                    format!("must be between 0 and 10, got {}", sharpen),
                ));
            }
        }
        // Directly constructed Gravity::Named values have not been through
        // FromStr; hold them to the same rules.
        if let Some(Gravity::Named(ref name)) = self.gravity {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(AppError::validation(
                    "gravity",
                    format!("invalid focal point name: {:?}", name),
                ));
            }
        }
        if let Some(angle) = self.rotate {
            if !matches!(angle, 0 | 90 | 180 | 270) {
                return Err(AppError::validation(
                    "rotate",
                    format!("must be 0, 90, 180, or 270, got {}", angle),
                ));
            }
        }
        if let Some(ref color) = self.background {
            validate_hex_color("background", color)?;
        }
        let border = match self.border {
            Some((width, color)) => {
                if width == 0 {
                    return Err(AppError::validation("border", "width must be positive"));
                }
                validate_hex_color("border", &color)?;
                Some(Border { width, color })
            }
            None => None,
        };

        Ok(TransformationSpec {
            width: self.width,
            height: self.height,
            fit: self.fit,
            gravity: self.gravity,
            format: self.format,
            quality: self.quality,
            blur: self.blur,
            sharpen: self.sharpen,
            rotate: self.rotate,
            background: self.background,
            border,
            trim: self.trim,
        })
    }
}

/// Accepts `#rgb`, `#rrggbb`, or `#rrggbbaa`.
fn validate_hex_color(field: &str, color: &str) -> Result<(), AppError> {
    let digits = color.strip_prefix('#').ok_or_else(|| {
        AppError::validation(field, format!("color must start with '#', got {:?}", color))
    })?;
    let valid_len = matches!(digits.len(), 3 | 6 | 8);
    if !valid_len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::validation(
            field,
            format!("invalid hex color: {:?}", color),
        ));
    }
    Ok(())
}
