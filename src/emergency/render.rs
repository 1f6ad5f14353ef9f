//! Printable emergency card as a single self-contained HTML document.
//!
//! Identity and emergency-contact fields always render, with `N/A` for
//! missing values. Clinical free-text sections (allergies, medications,
//! conditions) only render when they have content; the doctor section only
//! when a doctor name is set.

use std::io::Write;

use chrono::NaiveDateTime;

use super::export::ArtifactSource;
use crate::models::{EmergencyCardData, FamilyMember};

pub const NOT_AVAILABLE: &str = "N/A";

/// Rendered card, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDocument {
    pub title: String,
    pub html: String,
}

impl ArtifactSource for CardDocument {
    fn serialize(&self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(self.html.as_bytes())
    }

    fn media_type(&self) -> &'static str {
        "text/html"
    }
}

pub fn render_card(
    member: &FamilyMember,
    data: &EmergencyCardData,
    qr_data_uri: &str,
    generated_at: NaiveDateTime,
) -> CardDocument {
    let title = format!("Emergency Health Card - {}", member.name);
    let age = member.age.map(|a| a.to_string());

    let mut body = String::new();

    // Header
    body.push_str(&format!(
        "<div class=\"header\"><div class=\"badge\">&#127384; EMERGENCY HEALTH CARD</div>\
         <h1 class=\"name\">{}</h1></div>\n",
        escape_html(&member.name)
    ));

    // Identity
    body.push_str("<div class=\"info-grid\">\n");
    body.push_str(&info_item("Age", age.as_deref()));
    body.push_str(&info_item("Gender", member.gender.as_deref()));
    body.push_str(&info_item("Blood Group", Some(data.blood_group.as_str())));
    body.push_str(&info_item("Phone", member.phone.as_deref()));
    body.push_str("</div>\n");

    // Emergency contact
    body.push_str(&format!(
        "<div class=\"contact\"><div class=\"section-title\">&#128222; Emergency Contact</div>\
         <div class=\"section-content\"><strong>{}</strong><br>{}</div></div>\n",
        or_na(&data.emergency_contact_name),
        or_na(&data.emergency_contact_phone)
    ));

    // Clinical sections
    body.push_str(&section("allergies", "&#9888;&#65039; Allergies", &data.allergies));
    body.push_str(&section(
        "medications",
        "&#128138; Current Medications",
        &data.ongoing_medicines,
    ));
    body.push_str(&section(
        "conditions",
        "&#127973; Medical Conditions",
        &data.medical_conditions,
    ));
    if !data.doctor_name.trim().is_empty() {
        let phone = if data.doctor_phone.trim().is_empty() {
            "No phone provided".to_string()
        } else {
            escape_html(data.doctor_phone.trim())
        };
        body.push_str(&format!(
            "<div class=\"section doctor\"><div class=\"section-title\">&#129658; Primary Doctor</div>\
             <div class=\"section-content\"><strong>{}</strong><br>{}</div></div>\n",
            escape_html(data.doctor_name.trim()),
            phone
        ));
    }

    // QR + footer
    body.push_str(&format!(
        "<div class=\"qr-section\"><div class=\"section-title\">&#128241; Scan for Full Profile</div>\
         <img class=\"qr\" src=\"{}\" alt=\"QR code linking to the medical timeline\">\
         <div class=\"hint\">Scan to view complete medical history</div></div>\n\
         <div class=\"footer\">Generated on {}<br>Keep this card in your wallet for emergencies</div>\n",
        escape_html(qr_data_uri),
        generated_at.format("%Y-%m-%d %H:%M")
    ));

    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{CARD_STYLE}</style>\n</head>\n<body>\n\
         <div class=\"card\">\n{body}</div>\n</body>\n</html>\n",
        escape_html(&title)
    );

    CardDocument { title, html }
}

fn info_item(label: &str, value: Option<&str>) -> String {
    format!(
        "<div class=\"info-item\"><div class=\"label\">{label}</div><div class=\"value\">{}</div></div>\n",
        or_na(value.unwrap_or_default())
    )
}

/// Conditional block; empty string when the text is blank.
fn section(class: &str, title: &str, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    format!(
        "<div class=\"section {class}\"><div class=\"section-title\">{title}</div>\
         <div class=\"section-content\">{}</div></div>\n",
        escape_html(text).replace('\n', "<br>")
    )
}

fn or_na(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        escape_html(value)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CARD_STYLE: &str = r#"
  * { box-sizing: border-box; }
  body { font-family: Arial, Helvetica, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; color: #333; }
  .card { max-width: 400px; margin: 0 auto; background: #fff; border: 2px solid #dc2626; border-radius: 15px; padding: 20px; box-shadow: 0 8px 32px rgba(0,0,0,0.1); }
  .header { text-align: center; border-bottom: 2px solid #dc2626; padding-bottom: 15px; margin-bottom: 20px; }
  .badge { display: inline-block; background: #dc2626; color: #fff; font-size: 14px; font-weight: bold; padding: 8px 16px; border-radius: 20px; margin-bottom: 10px; }
  .name { font-size: 24px; margin: 0; }
  .info-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 10px; margin-bottom: 15px; }
  .info-item { background: #f8f9fa; border-radius: 8px; padding: 8px; }
  .label { font-size: 12px; font-weight: bold; color: #666; text-transform: uppercase; }
  .value { font-size: 14px; margin-top: 2px; }
  .contact { background: #fef2f2; border: 1px solid #fecaca; border-radius: 8px; padding: 10px; margin-bottom: 15px; }
  .section { background: #f8f9fa; border-left: 4px solid #dc2626; border-radius: 8px; padding: 10px; margin-bottom: 15px; }
  .section-title { font-size: 12px; font-weight: bold; color: #dc2626; text-transform: uppercase; margin-bottom: 5px; }
  .section-content { font-size: 13px; line-height: 1.4; }
  .qr-section { text-align: center; border-top: 1px solid #eee; margin-top: 20px; padding-top: 15px; }
  .qr { width: 120px; height: 120px; margin: 10px 0; image-rendering: pixelated; }
  .hint { font-size: 10px; color: #666; }
  .footer { text-align: center; font-size: 10px; color: #666; margin-top: 15px; }
  @media print {
    body { background: #fff; padding: 0; }
    .card { box-shadow: none; margin: 0; max-width: none; }
  }
"#;
