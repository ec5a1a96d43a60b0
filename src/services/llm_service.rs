// src/services/llm_service.rs
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::debug;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use crate::errors::KisskinError;
use crate::models::{DataUrl, Profile};

pub const TEXT_MODEL: &str = "gpt-4o";
pub const IMAGE_MODEL: &str = "gpt-image-1";

/// Outbound generation calls, behind a trait so handlers can run against a
/// stub in tests. Both methods are independent and safe to issue concurrently.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Text consultation for the given profile; returns the raw completion
    /// text (expected to be the structured JSON report, but not guaranteed).
    async fn consultation_report(
        &self,
        api_key: &str,
        photo_data_url: &str,
        profile: &Profile,
    ) -> Result<String, KisskinError>;

    /// Composite makeup-style grid rendered from the photo; returns the PNG
    /// as bare base64 (no data-URL prefix).
    async fn style_grid(
        &self,
        api_key: &str,
        photo: &DataUrl,
        profile: &Profile,
    ) -> Result<String, KisskinError>;
}

pub struct LLMService {
    client: Client,
    base_url: String,
}

impl LLMService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn report_system_prompt(profile: &Profile) -> String {
        format!(
            "당신은 전문 퍼스널 메이크업 컨설턴트입니다.\n\
             사용자의 얼굴 사진을 분석하고, 선택한 정보를 바탕으로 맞춤형 화장품 추천 보고서를 작성해주세요.\n\n\
             반드시 아래 JSON 형식으로만 응답하세요. 코드 펜스나 다른 설명 없이 JSON 객체 하나만 출력합니다:\n\
             {{\n\
             \x20 \"analysis\": \"피부 톤, 얼굴형, 특징 분석과 {skin} 피부 타입 주의사항 요약\",\n\
             \x20 \"products\": [\n\
             \x20   {{ \"category\": \"Skin|Base|Eyes|Lips|Cheeks\", \"name\": \"제품명\", \"brand\": \"브랜드\", \"price\": \"가격대\", \"reason\": \"추천 이유\" }}\n\
             \x20 ]\n\
             }}\n\n\
             카테고리별로 한국 화장품 브랜드 제품을 3~5개 추천해주세요. 문장은 친근하면서도 전문적인 톤으로 작성합니다.",
            skin = profile.skin_type.label_ko(),
        )
    }

    fn report_user_prompt(profile: &Profile) -> String {
        let mut prompt = format!(
            "성별: {}\n피부 타입: {}\n",
            profile.gender.label_ko(),
            profile.skin_type.label_ko(),
        );
        if let Some(style) = &profile.makeup_style {
            prompt.push_str(&format!("원하는 화장법: {style}\n"));
        }
        prompt.push_str("\n위 정보와 첨부된 사진을 분석하여 맞춤 화장품 추천 보고서를 작성해주세요.");
        prompt
    }

    fn grid_prompt(profile: &Profile) -> String {
        let layout = profile.layout;
        let personas = layout
            .personas()
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{}) {name}", i + 1))
            .collect::<Vec<_>>()
            .join(" ");
        let mut prompt = format!(
            "Create a single {layout} grid image containing {count} makeup variations of the \
             person in the attached photo. Keep the exact same face, identity, pose, and framing \
             in every cell; change only the makeup. Cells, left to right and top to bottom: \
             {personas}. Subject: {gender}, {skin} skin.",
            count = layout.arity(),
            gender = profile.gender.label_en(),
            skin = profile.skin_type.label_en(),
        );
        if let Some(style) = &profile.makeup_style {
            prompt.push_str(&format!(" Preferred direction: {style}."));
        }
        prompt.push_str(" Do not draw separators, borders, or text on the image.");
        prompt
    }

    // Provider output size follows the source aspect so faces are not squashed.
    fn grid_image_size(profile: &Profile) -> &'static str {
        match profile.photo_ratio {
            Some(ratio) if ratio < 0.9 => "1024x1536",
            Some(ratio) if ratio > 1.1 => "1536x1024",
            _ => "1024x1024",
        }
    }

    async fn fetch_hosted_image(&self, url: &str) -> Result<String, KisskinError> {
        debug!("fetching hosted image result");
        let response = self.client.get(url).send().await.map_err(|e| {
            KisskinError::upstream(format!("Failed to fetch generated image: {e}"))
        })?;
        if !response.status().is_success() {
            return Err(KisskinError::upstream(format!(
                "Failed to fetch generated image ({})",
                response.status()
            )));
        }
        let bytes = response.bytes().await.map_err(|e| {
            KisskinError::upstream(format!("Failed to read generated image: {e}"))
        })?;
        Ok(general_purpose::STANDARD.encode(&bytes))
    }
}

#[async_trait]
impl GenerationBackend for LLMService {
    async fn consultation_report(
        &self,
        api_key: &str,
        photo_data_url: &str,
        profile: &Profile,
    ) -> Result<String, KisskinError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "model": TEXT_MODEL,
                "messages": [
                    { "role": "system", "content": Self::report_system_prompt(profile) },
                    {
                        "role": "user",
                        "content": [
                            { "type": "text", "text": Self::report_user_prompt(profile) },
                            {
                                "type": "image_url",
                                "image_url": { "url": photo_data_url, "detail": "low" }
                            }
                        ]
                    }
                ],
                "max_tokens": 2000,
                "temperature": 0.7
            }))
            .send()
            .await
            .map_err(|e| KisskinError::upstream(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(KisskinError::upstream_with_detail(
                format!("OpenAI API error ({status})"),
                error_text,
            ));
        }

        let result: Value = response.json().await.map_err(|e| {
            KisskinError::upstream(format!("Failed to parse OpenAI response: {e}"))
        })?;

        extract_message_text(&result)
            .ok_or_else(|| KisskinError::upstream("No text content in provider response"))
    }

    async fn style_grid(
        &self,
        api_key: &str,
        photo: &DataUrl,
        profile: &Profile,
    ) -> Result<String, KisskinError> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(format!("selfie.{}", photo.extension()))
            .mime_str(&photo.mime)
            .map_err(|e| KisskinError::Internal(format!("photo MIME rejected: {e}")))?;
        let form = Form::new()
            .part("image", part)
            .text("model", IMAGE_MODEL)
            .text("prompt", Self::grid_prompt(profile))
            .text("n", "1")
            .text("size", Self::grid_image_size(profile));

        let response = self
            .client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                KisskinError::upstream(format!("Image generation request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(KisskinError::upstream_with_detail(
                format!("Image generation error ({status})"),
                error_text,
            ));
        }

        let result: Value = response.json().await.map_err(|e| {
            KisskinError::upstream(format!("Failed to parse generation response: {e}"))
        })?;

        match extract_image_payload(&result) {
            Some(ImagePayload::Inline(b64)) => Ok(b64),
            Some(ImagePayload::Hosted(url)) => self.fetch_hosted_image(&url).await,
            None => Err(KisskinError::upstream("No image data in provider response")),
        }
    }
}

/// Where a generated image landed in the provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Inline(String),
    Hosted(String),
}

/// Pulls completion text out of either upstream schema: classic chat
/// (`choices[0].message.content`, string or typed blocks) or the responses API
/// (`output[]` message items with `output_text` blocks).
pub fn extract_message_text(value: &Value) -> Option<String> {
    if let Some(content) = value.pointer("/choices/0/message/content") {
        match content {
            Value::String(text) if !text.is_empty() => return Some(text.clone()),
            Value::Array(blocks) => {
                let text = blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
                if !text.is_empty() {
                    return Some(text);
                }
            }
            _ => {}
        }
    }

    if let Some(output) = value.get("output").and_then(Value::as_array) {
        let mut parts = Vec::new();
        for item in output {
            if item.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            let Some(blocks) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        parts.push(text.to_string());
                    }
                }
            }
        }
        if !parts.is_empty() {
            return Some(parts.join("\n"));
        }
    }

    None
}

/// Pulls a generated image out of either upstream schema: the images API
/// (`data[0].b64_json` or `data[0].url`) or a responses-API
/// `image_generation_call` output item.
pub fn extract_image_payload(value: &Value) -> Option<ImagePayload> {
    if let Some(first) = value.pointer("/data/0") {
        if let Some(b64) = first.get("b64_json").and_then(Value::as_str) {
            return Some(ImagePayload::Inline(b64.to_string()));
        }
        if let Some(url) = first.get("url").and_then(Value::as_str) {
            return Some(ImagePayload::Hosted(url.to_string()));
        }
    }

    if let Some(output) = value.get("output").and_then(Value::as_array) {
        for item in output {
            if item.get("type").and_then(Value::as_str) == Some("image_generation_call") {
                if let Some(b64) = item.get("result").and_then(Value::as_str) {
                    return Some(ImagePayload::Inline(b64.to_string()));
                }
            }
        }
    }

    None
}
