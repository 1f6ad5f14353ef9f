//! Emergency health card generation.
//!
//! Pipeline, leaf first:
//! 1. `codec` — past medical history <-> URL-safe token
//! 2. `link` — timeline link with the optional `pmh` token
//! 3. `qr` — link -> QR raster / SVG / data URI
//! 4. `render` — member + card data + QR -> HTML card
//! 5. `export` — staged serialization handed to an artifact sink

pub mod codec;
pub mod export;
pub mod link;
pub mod qr;
pub mod render;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use thiserror::Error;

use crate::config::CardConfig;
use crate::db::{self, DatabaseError};
use crate::models::{EmergencyCardData, FamilyMember, MemberId};

pub use codec::DecodeError;
pub use export::{ArtifactSink, ArtifactSource, DirectorySink, ExportError};
pub use link::{LinkError, TimelineLink};
pub use qr::{ErrorCorrection, ImageFormat, QrCodeRenderer, QrError, QrImage, QrOptions, QrRenderer};
pub use render::CardDocument;

#[derive(Error, Debug)]
pub enum EmergencyError {
    #[error("Could not load member: {0}")]
    DataFetch(#[from] DatabaseError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Everything produced by one generation request.
#[derive(Debug, Clone)]
pub struct GeneratedCard {
    pub link: String,
    pub qr: QrImage,
    pub qr_data_uri: String,
    pub document: CardDocument,
    pub filename: String,
}

/// Load the member (scoped to its account) and prefill card data, including
/// the first doctor on file.
pub fn load_card_data(
    conn: &Connection,
    member_id: &MemberId,
    account_id: &str,
) -> Result<(FamilyMember, EmergencyCardData), EmergencyError> {
    let member = db::fetch_family_member(conn, member_id, account_id)?;
    let doctors = db::list_doctors_for_member(conn, member_id)?;
    let data = EmergencyCardData::from_member(&member).with_primary_doctor(doctors.first());
    Ok((member, data))
}

/// Timeline link for the QR payload.
pub fn card_link(config: &CardConfig, member: &FamilyMember, data: &EmergencyCardData) -> String {
    link::build_timeline_link(&config.origin, &member.id, data.medical_history())
}

/// Encode the member's timeline link as a QR image.
pub fn generate_qr(
    config: &CardConfig,
    member: &FamilyMember,
    data: &EmergencyCardData,
    renderer: &dyn QrRenderer,
) -> Result<(String, QrImage), EmergencyError> {
    let link = card_link(config, member, data);
    let image = renderer.encode(&link, &config.qr)?;
    tracing::info!(
        member_id = %member.id,
        has_history = data.medical_history().is_some(),
        modules = image.modules(),
        "Emergency QR generated"
    );
    Ok((link, image))
}

/// Build the complete card. Reuses `qr` when it was generated earlier in
/// the same session.
pub fn build_card(
    config: &CardConfig,
    member: &FamilyMember,
    data: &EmergencyCardData,
    renderer: &dyn QrRenderer,
    qr: Option<(String, QrImage)>,
    generated_at: NaiveDateTime,
) -> Result<GeneratedCard, EmergencyError> {
    let (link, qr) = match qr {
        Some(existing) => existing,
        None => generate_qr(config, member, data, renderer)?,
    };
    let qr_data_uri = qr.to_data_uri(config.image_format)?;
    let document = render::render_card(member, data, &qr_data_uri, generated_at);

    Ok(GeneratedCard {
        link,
        qr,
        qr_data_uri,
        document,
        filename: export::card_filename(&member.name),
    })
}

/// Export a built card through the sink.
pub fn export_card(
    card: &GeneratedCard,
    staging_dir: &Path,
    sink: &dyn ArtifactSink,
) -> Result<PathBuf, EmergencyError> {
    Ok(export::export_artifact(
        &card.document,
        &card.filename,
        staging_dir,
        sink,
    )?)
}
