//! GStreamer initialization and diagnostics

use std::env;
use std::sync::Once;

static GSTREAMER_INIT: Once = Once::new();

/// Initialize GStreamer once and log the runtime version.
///
/// Capture sources and clip writers call `gst::init()` themselves; this only
/// surfaces a missing installation early in the log.
pub fn init_gstreamer_env() {
    GSTREAMER_INIT.call_once(|| match gstreamer::init() {
        Ok(_) => {
            log::info!("GStreamer initialized successfully");
            log_gstreamer_version();
            report_missing_elements(&get_gstreamer_info());
        }
        Err(e) => {
            log::error!("Failed to initialize GStreamer: {}", e);
            log::error!("Camera capture and clip recording will not be available");
        }
    });
}

fn report_missing_elements(info: &GStreamerInfo) {
    if let Some(path) = &info.plugin_path {
        log::debug!("GST_PLUGIN_PATH: {}", path);
    }
    if !info.missing_elements.is_empty() {
        log::warn!(
            "GStreamer elements not found: {}; affected cameras or clips will fail to open",
            info.missing_elements.join(", ")
        );
    }
}

fn log_gstreamer_version() {
    let (major, minor, micro, nano) = gstreamer::version();
    let nano_str = match nano {
        0 => String::new(),
        1 => " (CVS)".to_string(),
        2 => " (prerelease)".to_string(),
        _ => format!(" (nano: {})", nano),
    };
    log::info!("GStreamer version: {}.{}.{}{}", major, minor, micro, nano_str);
}

/// Information about the GStreamer installation for diagnostics
#[derive(Debug, Clone)]
pub struct GStreamerInfo {
    pub is_available: bool,
    pub version: Option<String>,
    pub plugin_path: Option<String>,
    /// Elements the capture and clip pipelines need but cannot find
    pub missing_elements: Vec<&'static str>,
}

const REQUIRED_ELEMENTS: &[&str] = &[
    "uridecodebin",
    "videoconvert",
    "appsink",
    "appsrc",
    "jpegenc",
    "matroskamux",
    "filesink",
];

pub fn get_gstreamer_info() -> GStreamerInfo {
    let version = match gstreamer::init() {
        Ok(_) => {
            let (major, minor, micro, _) = gstreamer::version();
            Some(format!("{}.{}.{}", major, minor, micro))
        }
        Err(_) => None,
    };
    let is_available = version.is_some();

    let missing_elements = if is_available {
        REQUIRED_ELEMENTS
            .iter()
            .copied()
            .filter(|name| gstreamer::ElementFactory::find(name).is_none())
            .collect()
    } else {
        REQUIRED_ELEMENTS.to_vec()
    };

    GStreamerInfo {
        is_available,
        version,
        plugin_path: env::var("GST_PLUGIN_PATH").ok(),
        missing_elements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_elements_are_a_subset_of_required() {
        let info = get_gstreamer_info();
        assert!(info
            .missing_elements
            .iter()
            .all(|name| REQUIRED_ELEMENTS.contains(name)));
        if !info.is_available {
            assert!(info.version.is_none());
            assert_eq!(info.missing_elements.len(), REQUIRED_ELEMENTS.len());
        }
    }
}
