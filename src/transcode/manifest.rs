use super::{Result, TranscodeError};
use crate::ladder::QualityCatalog;
use crate::status::{write_atomic, JobStatus};
use hlsforge_common::paths::{JobLayout, MASTER_MANIFEST};
use hlsforge_common::RenditionState;
use hlsforge_media::{MasterPlaylist, StreamInfo};
use tracing::{debug, info};

/// Write the master manifest for a finalized job.
///
/// One entry is emitted, in catalog order, per rendition that finished ok
/// and whose sub-manifest exists. Returns the manifest's file name, or
/// `None` (after removing any stale manifest) when nothing qualifies.
pub async fn assemble_master(
    catalog: &QualityCatalog,
    layout: &JobLayout,
    status: &JobStatus,
) -> Result<Option<String>> {
    let mut master = MasterPlaylist::new();

    for preset in catalog.iter() {
        let Some(rendition) = status.rendition(&preset.label) else {
            continue;
        };
        if rendition.state != RenditionState::Ok {
            continue;
        }
        if !tokio::fs::try_exists(layout.sub_manifest_path(&preset.label)).await? {
            debug!(
                "Rendition {}/{} is ok but has no sub-manifest, leaving it out",
                status.job_id, preset.label
            );
            continue;
        }

        let size = rendition.target_resolution.unwrap_or(preset.resolution());
        master = master.add_stream(StreamInfo {
            uri: JobLayout::sub_manifest_relative(&preset.label),
            bandwidth: preset.bandwidth_bps(),
            average_bandwidth: Some(preset.average_bandwidth_bps()),
            width: size.width,
            height: size.height,
            codecs: preset.codecs(),
            frame_rate: Some(preset.frame_rate as f64),
            name: Some(preset.label.clone()),
        });
    }

    let path = layout.master_manifest_path();

    if master.is_empty() {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!("Removed stale master manifest for job {}", status.job_id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        return Ok(None);
    }

    write_atomic(&path, master.render().as_bytes())
        .await
        .map_err(|e| TranscodeError::Finalization(format!("writing {:?}: {}", path, e)))?;

    info!(
        "Wrote master manifest for job {} with {} renditions",
        status.job_id,
        master.streams.len()
    );
    Ok(Some(MASTER_MANIFEST.to_string()))
}
