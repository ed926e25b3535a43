//! Receipts.
//!
//! A receipt is a fixed-width, paginated text document built from a stored order. It can be
//! rendered as plain text (pages separated by form feeds), as a printable HTML page that opens
//! the print dialog on load, or saved as `kvitto-<order_number>.txt`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{cart::items_total, models::OrderEntity};

pub const DEFAULT_WIDTH: usize = 42;
pub const DEFAULT_LINES_PER_PAGE: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptLayout {
    /// Characters per line.
    pub width: usize,
    pub lines_per_page: usize,
}

impl Default for ReceiptLayout {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            lines_per_page: DEFAULT_LINES_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptFormat {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub order_number: i64,
    pub total: i32,
    pub pages: Vec<Vec<String>>,
}

/// Keeps ASCII and Latin-1/Latin Extended-A letters (å, ä, ö, é, ...). Everything else, emoji
/// and symbols included, is dropped.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(*c, '\u{0000}'..='\u{007F}' | '\u{00C0}'..='\u{017F}'))
        .filter(|c| !c.is_control())
        .collect()
}

fn kr(amount: i32) -> String {
    format!("{amount} kr")
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    for token in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(token);
            continue;
        }
        if line.chars().count() + 1 + token.chars().count() > width.max(8) {
            out.push(std::mem::take(&mut line));
            line.push_str(token);
        } else {
            line.push(' ');
            line.push_str(token);
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
    out
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((width - len) / 2), text)
}

/// Label on the left, value flush right. Long labels wrap and the value goes on the last line.
fn line_pair(label: &str, value: &str, width: usize) -> Vec<String> {
    let value_len = value.chars().count();
    let indent = label.len() - label.trim_start().len();
    let mut lines: Vec<String> = wrap(label, width.saturating_sub(value_len + 1 + indent))
        .into_iter()
        .map(|line| format!("{}{line}", " ".repeat(indent)))
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    if let Some(last) = lines.last_mut() {
        let pad = width.saturating_sub(last.chars().count() + value_len).max(1);
        last.push_str(&" ".repeat(pad));
        last.push_str(value);
    }
    lines
}

struct Builder {
    width: usize,
    lines: Vec<String>,
}

impl Builder {
    fn text(&mut self, text: &str) {
        self.lines.extend(wrap(&sanitize(text), self.width));
    }

    fn centered(&mut self, text: &str) {
        self.lines.push(center(&sanitize(text), self.width));
    }

    fn pair(&mut self, label: &str, value: &str) {
        self.lines
            .extend(line_pair(&sanitize(label), &sanitize(value), self.width));
    }

    fn separator(&mut self) {
        self.lines.push("-".repeat(self.width));
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }
}

pub fn generate_receipt(order: &OrderEntity, layout: ReceiptLayout) -> Receipt {
    let mut doc = Builder {
        width: layout.width,
        lines: Vec::new(),
    };
    let items = order.line_items();
    let location = order
        .location()
        .map(|location| location.display_name().to_string())
        .unwrap_or_else(|| order.location.clone());

    doc.centered("KVITTO");
    doc.centered(&format!("Bistro {location}"));
    doc.blank();
    doc.pair(
        &format!("Order #{}", order.order_number),
        &order.created_at.format("%Y-%m-%d %H:%M").to_string(),
    );
    if let Some(status) = order.status() {
        doc.pair("Status", status.label());
    }
    doc.separator();

    doc.pair("Kund", &order.customer_name);
    doc.pair("Telefon", &order.phone);
    doc.pair("E-post", &order.customer_email);
    if order.is_delivery() {
        doc.text(&format!(
            "Leveransadress: {}",
            order.delivery_address.as_deref().unwrap_or("-")
        ));
    } else {
        let time = match order.pickup_time.as_deref() {
            Some("asap") | None => "Snarast".to_string(),
            Some(minutes) => format!("om {minutes} min"),
        };
        doc.pair("Upphämtning", &time);
    }
    doc.separator();

    for item in &items {
        doc.pair(
            &format!("{} x {}", item.quantity, item.name),
            &kr(item.price.saturating_mul(item.quantity)),
        );
        for extra in &item.extras {
            doc.pair(
                &format!("  + {} ({} kr/st)", extra.name, extra.price),
                &kr(extra.price.saturating_mul(item.quantity)),
            );
        }
    }
    doc.separator();

    let total = if order.total_price > 0 {
        order.total_price
    } else {
        items_total(&items).unwrap_or(i32::MAX)
    };
    doc.pair("TOTALT", &kr(total));
    if let Some(payment) = order.payment_method.as_deref() {
        let label = match payment {
            "on_pickup_card" => "Kort vid upphämtning",
            "on_pickup_cash" => "Kontant vid upphämtning",
            "swish" => "Swish",
            other => other,
        };
        doc.pair("Betalning", label);
    }

    if let Some(instructions) = order.special_instructions.as_deref() {
        doc.blank();
        doc.text("Önskemål:");
        doc.text(instructions);
    }

    doc.blank();
    doc.centered("Tack för din beställning!");

    let per_page = layout.lines_per_page.max(1);
    let pages = doc
        .lines
        .chunks(per_page)
        .map(<[String]>::to_vec)
        .collect();

    Receipt {
        order_number: order.order_number,
        total,
        pages,
    }
}

impl Receipt {
    pub fn file_name(&self) -> String {
        format!("kvitto-{}.txt", self.order_number)
    }

    pub fn render_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\x0c\n")
    }

    /// Printable page that opens the print dialog as soon as it has loaded.
    pub fn render_html(&self) -> String {
        let body: String = self
            .pages
            .iter()
            .map(|page| format!("<section class=\"page\"><pre>{}</pre></section>", esc(&page.join("\n"))))
            .collect();
        html_shell(&format!("Kvitto #{}", self.order_number), &body)
    }

    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render_text())
            .with_context(|| format!("Failed to write receipt to {}", path.display()))?;
        info!(order_number = self.order_number, path = %path.display(), "Receipt saved");
        Ok(path)
    }
}

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="sv">
<head>
<meta charset="UTF-8"/>
<title>{}</title>
<style>
@page {{ size: 80mm auto; margin: 4mm; }}
body {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; margin: 0; color: #111; }}
pre {{ font-size: 11px; margin: 0; }}
.page {{ page-break-after: always; }}
.page:last-child {{ page-break-after: auto; }}
</style>
</head>
<body>{}
<script>window.addEventListener("load", function () {{ window.print(); }});</script>
</body>
</html>"#,
        esc(title),
        body
    )
}
