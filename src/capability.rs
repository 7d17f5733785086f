//! Hardware capability probe.
//!
//! A plot asks once, at construction, whether the hardware renderer can run
//! here. The answer is cached on the plot and never re-probed.

use crate::pipeline::SURFACE_SHADER;

use iced::wgpu;
use serde::{Deserialize, Serialize};

/// Variable iced reads to pick its renderer. `tiny-skia` has no wgpu device.
pub const BACKEND_ENV: &str = "ICED_BACKEND";

/// Result of probing for hardware rendering support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Capable { adapter: String },
    Unavailable(String),
}

impl Capability {
    pub fn is_capable(&self) -> bool {
        matches!(self, Capability::Capable { .. })
    }
}

/// Which renderer a plot should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Hardware when the probe succeeds, software otherwise.
    #[default]
    Auto,
    Software,
    /// Hardware, falling back to software with a warning when unavailable.
    Hardware,
}

/// Which renderer a plot actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Software,
    Hardware,
}

/// Reason the hardware path is ruled out by the `ICED_BACKEND` value, if any.
pub fn forced_software(iced_backend: Option<&str>) -> Option<String> {
    let value = iced_backend?.trim();
    let software = value
        .split(',')
        .map(str::trim)
        .next()
        .is_some_and(|first| {
            first.eq_ignore_ascii_case("tiny-skia") || first.eq_ignore_ascii_case("tiny_skia")
        });
    software.then(|| format!("{BACKEND_ENV}={value} selects the software renderer"))
}

/// Probe for a wgpu device able to compile the surface shader.
pub fn probe() -> Capability {
    let env = std::env::var(BACKEND_ENV).ok();
    if let Some(reason) = forced_software(env.as_deref()) {
        tracing::info!(%reason, "hardware rendering disabled");
        return Capability::Unavailable(reason);
    }

    let capability = pollster::block_on(probe_device());
    match &capability {
        Capability::Capable { adapter } => {
            tracing::info!(%adapter, "hardware rendering available")
        }
        Capability::Unavailable(reason) => {
            tracing::warn!(%reason, "hardware rendering unavailable")
        }
    }
    capability
}

async fn probe_device() -> Capability {
    let instance = wgpu::Instance::default();

    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
    {
        Ok(adapter) => adapter,
        Err(err) => return Capability::Unavailable(format!("no adapter: {err}")),
    };
    let info = adapter.get_info();

    let (device, _queue) = match adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("surface_plot_probe"),
            ..Default::default()
        })
        .await
    {
        Ok(pair) => pair,
        Err(err) => return Capability::Unavailable(format!("device request failed: {err}")),
    };

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let _module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("surface_plot_probe_shader"),
        source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(SURFACE_SHADER)),
    });
    if let Some(err) = device.pop_error_scope().await {
        return Capability::Unavailable(format!("shader rejected: {err}"));
    }

    Capability::Capable {
        adapter: format!("{} ({:?})", info.name, info.backend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiny_skia_forces_software() {
        assert!(forced_software(Some("tiny-skia")).is_some());
        assert!(forced_software(Some("tiny_skia")).is_some());
        assert!(forced_software(Some(" Tiny-Skia ")).is_some());
        assert!(forced_software(Some("tiny-skia,wgpu")).is_some());
    }

    #[test]
    fn test_other_backends_allow_probe() {
        assert!(forced_software(None).is_none());
        assert!(forced_software(Some("wgpu")).is_none());
        assert!(forced_software(Some("wgpu,tiny-skia")).is_none());
        assert!(forced_software(Some("")).is_none());
    }

    #[test]
    fn test_capability_flag() {
        let capable = Capability::Capable {
            adapter: "test".into(),
        };
        assert!(capable.is_capable());
        assert!(!Capability::Unavailable("none".into()).is_capable());
        assert_eq!(BackendPreference::default(), BackendPreference::Auto);
    }
}
