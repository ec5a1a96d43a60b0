// src/client/render.rs
use crate::client::markdown;
use crate::models::{ProductRecommendation, StructuredReport};
use crate::report::Report;

/// Everything the result page shows; fields mirror what the gateway returned
/// plus the files the client wrote next to the page.
pub struct ResultPage<'a> {
    pub gender_label: &'a str,
    pub skin_label: &'a str,
    pub image_data_url: Option<&'a str>,
    /// (persona label, relative file name) per sliced cell, row-major.
    pub cells: Vec<(String, String)>,
    pub export_file: Option<&'a str>,
    pub report: Option<&'a Report>,
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn shopping_search_url(brand: &str, name: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("query", &format!("{brand} {name}"))
        .finish();
    format!("https://search.shopping.naver.com/search/all?{query}")
}

pub fn render_report_html(report: &Report) -> String {
    match report {
        Report::Freeform(text) => format!(
            "<div class=\"report-content\">{}</div>",
            markdown::render_html(text)
        ),
        Report::Structured(report) => render_structured(report),
    }
}

fn render_structured(report: &StructuredReport) -> String {
    let mut html = String::from("<div class=\"report-content structured\">");
    if let Some(analysis) = &report.analysis {
        html.push_str(&format!(
            "<h3 class=\"report-h3\">피부 분석</h3><p class=\"analysis\">{}</p>",
            escape_html(analysis)
        ));
    }
    if !report.products.is_empty() {
        html.push_str("<h3 class=\"report-h3\">맞춤 화장품 추천</h3><ul class=\"product-cards\">");
        for product in &report.products {
            html.push_str(&render_product(product));
        }
        html.push_str("</ul>");
    }
    html.push_str("</div>");
    html
}

fn render_product(product: &ProductRecommendation) -> String {
    format!(
        "<li class=\"product-card\"><span class=\"product-category\">{category}</span>\
         <strong>{brand} {name}</strong><span class=\"product-price\">{price}</span>\
         <p>{reason}</p>\
         <a href=\"{link}\" target=\"_blank\" rel=\"noreferrer\">구매처 찾기</a></li>",
        category = product.category.label_ko(),
        brand = escape_html(&product.brand),
        name = escape_html(&product.name),
        price = escape_html(&product.price),
        reason = escape_html(&product.reason),
        link = escape_html(&shopping_search_url(&product.brand, &product.name)),
    )
}

pub fn render_result_page(page: &ResultPage) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<header class=\"header\"><h1 class=\"title\">KisSkin</h1>\
         <p class=\"subtitle\">나만의 퍼스널 메이크업 분석</p></header>\
         <div class=\"report-meta\"><span>{}</span><span>{}</span></div>",
        escape_html(page.gender_label),
        escape_html(page.skin_label),
    ));

    if let Some(image) = page.image_data_url {
        body.push_str(&format!(
            "<section class=\"result-image-section\">\
             <h3 class=\"section-title\">메이크업 스타일</h3>\
             <img src=\"{}\" alt=\"메이크업 스타일\" class=\"result-image full\" />",
            escape_html(image)
        ));
        if let Some(export) = page.export_file {
            body.push_str(&format!(
                "<a class=\"download-btn\" href=\"{}\" download>이미지 저장하기</a>",
                escape_html(export)
            ));
        }
        body.push_str("</section>");
    }

    if !page.cells.is_empty() {
        body.push_str("<section class=\"persona-gallery\">");
        for (label, file) in &page.cells {
            body.push_str(&format!(
                "<figure class=\"persona-cell\"><img src=\"{}\" alt=\"{label}\" />\
                 <figcaption>{label}</figcaption></figure>",
                escape_html(file),
                label = escape_html(label),
            ));
        }
        body.push_str("</section>");
    }

    if let Some(report) = page.report {
        body.push_str(&format!(
            "<section class=\"report-section\">\
             <h3 class=\"section-title\">맞춤 화장품 추천</h3>{}</section>",
            render_report_html(report)
        ));
    }

    format!(
        "<!doctype html><html lang=\"ko\"><head><meta charset=\"utf-8\" />\
         <title>KisSkin 분석 결과</title></head><body><div class=\"container\">{body}</div>\
         </body></html>"
    )
}
