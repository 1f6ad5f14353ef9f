//! Emergency card — UI-facing commands.
//!
//! Every error from the pipeline is caught here, logged, and turned into a
//! [`Notification`]. Nothing is retried and no partial artifact survives.
//!
//! Flow:
//! - `open_emergency_card`: load member + prefilled card data
//! - `request_qr`: ask for past medical history first when none is set
//! - `submit_history_and_generate`: store the answer, then generate
//! - `generate_qr_code` / `generate_qr_async`: encode the timeline link
//! - `download_health_card`: render + export the HTML card

use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::CardConfig;
use crate::emergency::{self, ArtifactSink, EmergencyError, QrError, QrImage, QrRenderer};
use crate::models::{EmergencyCardData, FamilyMember, MemberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationVariant {
    Success,
    Destructive,
}

/// User-visible outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    fn success(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Success,
        }
    }

    fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Error".into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }
}

/// View-model for one open emergency card panel.
#[derive(Debug, Clone)]
pub struct CardView {
    pub member: FamilyMember,
    pub data: EmergencyCardData,
    /// Link and image from the last successful QR generation.
    pub qr: Option<(String, QrImage)>,
}

impl CardView {
    pub fn new(member: FamilyMember, data: EmergencyCardData) -> Self {
        Self {
            member,
            data,
            qr: None,
        }
    }

    /// Data URI of the generated QR, for on-screen preview.
    pub fn qr_preview(&self, config: &CardConfig) -> Option<String> {
        self.qr
            .as_ref()
            .and_then(|(_, image)| image.to_data_uri(config.image_format).ok())
    }
}

/// Whether QR generation can go ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrRequest {
    /// No past medical history yet: prompt for it first.
    NeedsHistory,
    Ready,
}

pub fn open_emergency_card(
    conn: &Connection,
    member_id: &str,
    account_id: &str,
) -> Result<CardView, Notification> {
    let member_id = MemberId::new(member_id)
        .map_err(|_| Notification::error("Failed to load member profile"))?;

    match emergency::load_card_data(conn, &member_id, account_id) {
        Ok((member, data)) => Ok(CardView::new(member, data)),
        Err(e) => {
            tracing::warn!(member_id = %member_id, error = %e, "Emergency card: member load failed");
            Err(Notification::error("Failed to load member profile"))
        }
    }
}

pub fn request_qr(view: &CardView) -> QrRequest {
    if view.data.medical_history().is_some() {
        QrRequest::Ready
    } else {
        QrRequest::NeedsHistory
    }
}

/// Store the prompted history (trimmed) and generate.
pub fn submit_history_and_generate(
    view: &mut CardView,
    history: &str,
    config: &CardConfig,
    renderer: &dyn QrRenderer,
) -> Notification {
    view.data.medical_conditions = history.trim().to_string();
    generate_qr_code(view, config, renderer)
}

pub fn generate_qr_code(
    view: &mut CardView,
    config: &CardConfig,
    renderer: &dyn QrRenderer,
) -> Notification {
    match emergency::generate_qr(config, &view.member, &view.data, renderer) {
        Ok(qr) => {
            view.qr = Some(qr);
            qr_success()
        }
        Err(e) => qr_failure(&view.member.id, &e),
    }
}

/// Generate the QR off the calling thread.
///
/// The view is held weakly: if it is dropped while encoding runs, the result
/// is discarded and `None` is returned.
pub async fn generate_qr_async(
    view: Weak<Mutex<CardView>>,
    config: CardConfig,
    renderer: Arc<dyn QrRenderer>,
) -> Option<Notification> {
    let (member, data) = {
        let view = view.upgrade()?;
        let guard = view.lock().unwrap_or_else(|p| p.into_inner());
        (guard.member.clone(), guard.data.clone())
    };
    let member_id = member.id.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        emergency::generate_qr(&config, &member, &data, renderer.as_ref())
    })
    .await;

    let Some(view) = view.upgrade() else {
        tracing::debug!(member_id = %member_id, "Card view closed before QR finished; result dropped");
        return None;
    };

    let notification = match outcome {
        Ok(Ok(qr)) => {
            let mut guard = view.lock().unwrap_or_else(|p| p.into_inner());
            guard.qr = Some(qr);
            qr_success()
        }
        Ok(Err(e)) => qr_failure(&member_id, &e),
        Err(join) => {
            tracing::error!(member_id = %member_id, error = %join, "QR task failed");
            Notification::error("Failed to generate QR code")
        }
    };
    Some(notification)
}

/// Render the card (reusing the on-screen QR if any) and save it.
pub fn download_health_card(
    view: &CardView,
    config: &CardConfig,
    renderer: &dyn QrRenderer,
    staging_dir: &Path,
    sink: &dyn ArtifactSink,
) -> Notification {
    let generated_at = chrono::Local::now().naive_local();
    let result = emergency::build_card(
        config,
        &view.member,
        &view.data,
        renderer,
        view.qr.clone(),
        generated_at,
    )
    .and_then(|card| emergency::export_card(&card, staging_dir, sink));

    match result {
        Ok(path) => {
            tracing::info!(member_id = %view.member.id, path = %path.display(), "Health card downloaded");
            Notification::success(
                "Health Card Downloaded!",
                "Emergency health card downloaded. Open the HTML file in your browser to print.",
            )
        }
        Err(e) => {
            tracing::warn!(member_id = %view.member.id, error = %e, "Health card generation failed");
            Notification::error(match e {
                EmergencyError::Qr(QrError::EncodingCapacityExceeded { .. }) => {
                    capacity_message().to_string()
                }
                _ => "Failed to generate health card".to_string(),
            })
        }
    }
}

fn qr_success() -> Notification {
    Notification::success(
        "QR Code Generated!",
        "QR links to the health timeline and embeds past history.",
    )
}

fn qr_failure(member_id: &MemberId, e: &EmergencyError) -> Notification {
    tracing::warn!(member_id = %member_id, error = %e, "QR generation failed");
    match e {
        EmergencyError::Qr(QrError::EncodingCapacityExceeded { .. }) => {
            Notification::error(capacity_message())
        }
        _ => Notification::error("Failed to generate QR code"),
    }
}

fn capacity_message() -> &'static str {
    "Past medical history is too long to fit in a QR code. Shorten it and try again."
}
