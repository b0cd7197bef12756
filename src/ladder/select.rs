use super::{QualityCatalog, RenditionPreset};

/// Result of preset selection, both halves in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub selected: Vec<&'a RenditionPreset>,
    pub skipped: Vec<&'a RenditionPreset>,
}

impl Selection<'_> {
    pub fn selected_labels(&self) -> Vec<&str> {
        self.selected.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn skipped_labels(&self) -> Vec<&str> {
        self.skipped.iter().map(|p| p.label.as_str()).collect()
    }
}

/// Pick the renditions to encode for one source.
///
/// 1. Presets taller than the source are dropped (none when the height is
///    unknown, i.e. zero).
/// 2. A non-empty `requested` list narrows the result to those labels,
///    compared case-insensitively.
/// 3. A network hint caps the ladder: below 1 Mbps only the two lowest
///    remaining rungs survive, below 5 Mbps nothing above 480p, below
///    10 Mbps nothing above 1080p.
pub fn select_presets<'a>(
    catalog: &'a QualityCatalog,
    source_height: u32,
    requested: Option<&[String]>,
    network_mbps: Option<f64>,
) -> Selection<'a> {
    let requested = requested.filter(|r| !r.is_empty());

    if let Some(labels) = requested {
        for label in labels {
            if catalog.get(label).is_none() {
                tracing::warn!("Ignoring unknown rendition label {:?}", label);
            }
        }
    }

    let mut candidates: Vec<&RenditionPreset> = catalog
        .iter()
        .filter(|p| source_height == 0 || p.height <= source_height)
        .filter(|p| match requested {
            Some(labels) => labels.iter().any(|l| l.eq_ignore_ascii_case(&p.label)),
            None => true,
        })
        .collect();

    if let Some(mbps) = network_mbps.filter(|m| m.is_finite() && *m >= 0.0) {
        candidates = apply_network_band(candidates, mbps);
    }

    let skipped = catalog
        .iter()
        .filter(|p| !candidates.iter().any(|c| c.label == p.label))
        .collect();

    Selection {
        selected: candidates,
        skipped,
    }
}

fn apply_network_band(mut candidates: Vec<&RenditionPreset>, mbps: f64) -> Vec<&RenditionPreset> {
    if mbps < 1.0 {
        // lowest two rungs
        candidates.sort_by(|a, b| b.height.cmp(&a.height));
        let keep_from = candidates.len().saturating_sub(2);
        candidates.split_off(keep_from)
    } else if mbps < 5.0 {
        candidates.retain(|p| p.height <= 480);
        candidates
    } else if mbps < 10.0 {
        candidates.retain(|p| p.height <= 1080);
        candidates
    } else {
        candidates
    }
}
