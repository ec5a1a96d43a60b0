// src/models.rs
use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::errors::KisskinError;

/// The nine makeup personas rendered into the style grid, row-major. A layout
/// with fewer cells uses a prefix of this list.
pub const STYLE_PERSONAS: [&str; 9] = [
    "Natural Glow",
    "Dewy Everyday",
    "Office Classic",
    "Rosy Date",
    "Peach Spring",
    "Vintage Mood",
    "Smoky Evening",
    "Bold Glam",
    "Cool Chic",
];

/// Inbound body of `POST /api/analyze`. Superset of the fields the client may
/// send; the required trio is checked in `validate`, everything else is
/// optional. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeRequest {
    pub photo: String,
    pub gender: String,
    pub skin_type: String,
    pub makeup_style: Option<String>,
    pub photo_ratio: Option<f32>,
    pub grid_photo: Option<String>,
    pub grid_size: Option<String>,
}

impl AnalyzeRequest {
    pub fn validate(&self) -> Result<(), KisskinError> {
        if self.photo.trim().is_empty()
            || self.gender.trim().is_empty()
            || self.skin_type.trim().is_empty()
        {
            return Err(KisskinError::Validation(
                "Missing required fields".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn label_ko(&self) -> &'static str {
        match self {
            Gender::Female => "여성",
            Gender::Male => "남성",
        }
    }

    pub fn label_en(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }
}

impl FromStr for Gender {
    type Err = KisskinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "여성" | "female" | "woman" | "f" => Ok(Gender::Female),
            "남성" | "male" | "man" | "m" => Ok(Gender::Male),
            other => Err(KisskinError::Validation(format!(
                "Unsupported gender: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkinType {
    Dry,
    Oily,
    Normal,
    Combination,
    Unknown,
}

impl SkinType {
    pub fn label_ko(&self) -> &'static str {
        match self {
            SkinType::Dry => "건성",
            SkinType::Oily => "지성",
            SkinType::Normal => "중성",
            SkinType::Combination => "복합성",
            SkinType::Unknown => "모름",
        }
    }

    pub fn label_en(&self) -> &'static str {
        match self {
            SkinType::Dry => "dry",
            SkinType::Oily => "oily",
            SkinType::Normal => "normal",
            SkinType::Combination => "combination",
            SkinType::Unknown => "unknown",
        }
    }
}

impl FromStr for SkinType {
    type Err = KisskinError;

    // Lenient: the client only offers four options, but provider prompts and
    // older clients send free text. Anything unrecognized becomes Unknown.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "건성" | "dry" => SkinType::Dry,
            "지성" | "oily" => SkinType::Oily,
            "중성" | "normal" => SkinType::Normal,
            "복합성" | "combination" | "combo" => SkinType::Combination,
            _ => SkinType::Unknown,
        })
    }
}

/// Grid arrangement of the composite style image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
}

impl GridLayout {
    pub fn arity(&self) -> u32 {
        self.rows * self.cols
    }

    pub fn personas(&self) -> &'static [&'static str] {
        let n = (self.arity() as usize).min(STYLE_PERSONAS.len());
        &STYLE_PERSONAS[..n]
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout { rows: 3, cols: 3 }
    }
}

impl fmt::Display for GridLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for GridLayout {
    type Err = KisskinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('×', "x");
        if normalized == "1" || normalized == "single" {
            return Ok(GridLayout { rows: 1, cols: 1 });
        }
        let (rows, cols) = normalized.split_once('x').ok_or_else(|| {
            KisskinError::Validation(format!("Unsupported grid size: {s}"))
        })?;
        let rows: u32 = rows
            .trim()
            .parse()
            .map_err(|_| KisskinError::Validation(format!("Unsupported grid size: {s}")))?;
        let cols: u32 = cols
            .trim()
            .parse()
            .map_err(|_| KisskinError::Validation(format!("Unsupported grid size: {s}")))?;
        let cells = rows.checked_mul(cols).unwrap_or(u32::MAX);
        if rows == 0 || cols == 0 || cells > STYLE_PERSONAS.len() as u32 {
            return Err(KisskinError::Validation(format!(
                "Unsupported grid size: {s}"
            )));
        }
        Ok(GridLayout { rows, cols })
    }
}

/// Validated profile attributes handed to the prompt builders.
#[derive(Debug, Clone)]
pub struct Profile {
    pub gender: Gender,
    pub skin_type: SkinType,
    pub makeup_style: Option<String>,
    pub photo_ratio: Option<f32>,
    pub layout: GridLayout,
}

impl Profile {
    pub fn from_request(req: &AnalyzeRequest) -> Result<Self, KisskinError> {
        let gender = req.gender.parse()?;
        let skin_type = req.skin_type.parse()?;
        let layout = match req.grid_size.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => GridLayout::default(),
        };
        let makeup_style = req
            .makeup_style
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Profile {
            gender,
            skin_type,
            makeup_style,
            photo_ratio: req.photo_ratio,
            layout,
        })
    }
}

/// A decoded `data:image/<type>;base64,<payload>` URL.
#[derive(Debug, Clone)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn parse(raw: &str) -> Result<Self, KisskinError> {
        let raw = raw.trim();
        let rest = raw.strip_prefix("data:").ok_or_else(|| {
            KisskinError::Validation("Photo must be a base64 image data URL".to_string())
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            KisskinError::Validation("Photo must be a base64 image data URL".to_string())
        })?;
        let mime = header
            .split(';')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !mime.starts_with("image/") {
            return Err(KisskinError::Validation(format!(
                "Unsupported photo MIME type: {mime}"
            )));
        }
        if !header.ends_with(";base64") {
            return Err(KisskinError::Validation(
                "Photo data URL must be base64 encoded".to_string(),
            ));
        }
        let bytes = general_purpose::STANDARD.decode(payload).map_err(|e| {
            KisskinError::Validation(format!("Photo is not valid base64: {e}"))
        })?;
        Ok(DataUrl { mime, bytes })
    }

    pub fn encode(mime: &str, bytes: &[u8]) -> String {
        format!(
            "data:{};base64,{}",
            mime,
            general_purpose::STANDARD.encode(bytes)
        )
    }

    pub fn to_url(&self) -> String {
        DataUrl::encode(&self.mime, &self.bytes)
    }

    pub fn extension(&self) -> &str {
        match self.mime.as_str() {
            "image/jpeg" => "jpg",
            other => other.split('/').nth(1).unwrap_or("png"),
        }
    }
}

/// Structured consultation output requested from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredReport {
    #[serde(alias = "summary", skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecommendation {
    pub category: ProductCategory,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCategory {
    Skin,
    Base,
    Eyes,
    Lips,
    Cheeks,
}

impl ProductCategory {
    pub fn label_ko(&self) -> &'static str {
        match self {
            ProductCategory::Skin => "스킨케어",
            ProductCategory::Base => "베이스",
            ProductCategory::Eyes => "아이",
            ProductCategory::Lips => "립",
            ProductCategory::Cheeks => "치크",
        }
    }
}
