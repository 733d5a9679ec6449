use std::fmt;

use crate::gfx::GfxError;

/// Context profile selector.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Profile {
    /// Modern-only feature set. Defined from API version 3.2 onwards.
    Core,
    /// Any version, legacy features allowed.
    Compatibility,
}

/// Requested API version (`major.minor`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Shader model an adapter must expose to host this API version.
    ///
    /// Returns `None` for versions that were never released.
    pub fn shader_model(self) -> Option<wgpu::ShaderModel> {
        match (self.major, self.minor) {
            (2, 0..=1) => Some(wgpu::ShaderModel::Sm2),
            (3, 0..=3) => Some(wgpu::ShaderModel::Sm4),
            (4, 0..=6) => Some(wgpu::ShaderModel::Sm5),
            _ => None,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What a lesson asks of the GPU context at bootstrap.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ContextRequest {
    pub version: ApiVersion,
    pub profile: Profile,

    /// Line polygon mode is needed to draw wireframes.
    pub wireframe: bool,
}

impl ContextRequest {
    pub const fn new(major: u32, minor: u32, profile: Profile) -> Self {
        Self {
            version: ApiVersion::new(major, minor),
            profile,
            wireframe: false,
        }
    }

    pub const fn with_wireframe(mut self) -> Self {
        self.wireframe = true;
        self
    }

    /// wgpu features the device must be created with.
    pub fn required_features(&self) -> wgpu::Features {
        if self.wireframe {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            wgpu::Features::empty()
        }
    }
}

impl fmt::Display for ContextRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let profile = match self.profile {
            Profile::Core => "core",
            Profile::Compatibility => "compatibility",
        };
        write!(f, "{} {profile}", self.version)?;
        if self.wireframe {
            f.write_str(" +wireframe")?;
        }
        Ok(())
    }
}

/// Capabilities of an adapter, reduced to what `check_support` looks at.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AdapterCaps {
    pub shader_model: wgpu::ShaderModel,
    pub polygon_mode_line: bool,
}

impl AdapterCaps {
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        Self {
            shader_model: adapter.get_downlevel_capabilities().shader_model,
            polygon_mode_line: adapter.features().contains(wgpu::Features::POLYGON_MODE_LINE),
        }
    }

    /// A fully capable desktop adapter.
    pub fn desktop() -> Self {
        Self {
            shader_model: wgpu::ShaderModel::Sm5,
            polygon_mode_line: true,
        }
    }
}

fn shader_model_rank(model: wgpu::ShaderModel) -> u8 {
    #[allow(unreachable_patterns)]
    match model {
        wgpu::ShaderModel::Sm2 => 2,
        wgpu::ShaderModel::Sm4 => 4,
        wgpu::ShaderModel::Sm5 => 5,
        _ => 5,
    }
}

/// Decides whether `caps` can satisfy `request`.
pub fn check_support(request: &ContextRequest, caps: &AdapterCaps) -> Result<(), GfxError> {
    let unsupported = |reason: String| GfxError::Unsupported {
        request: *request,
        reason,
    };

    let Some(required) = request.version.shader_model() else {
        return Err(unsupported(format!("API version {} does not exist", request.version)));
    };

    if request.profile == Profile::Core && request.version < ApiVersion::new(3, 2) {
        return Err(unsupported(
            "the core profile is only defined for version 3.2 and above".to_string(),
        ));
    }

    if shader_model_rank(caps.shader_model) < shader_model_rank(required) {
        return Err(unsupported(format!(
            "adapter exposes {:?}, version {} needs {:?}",
            caps.shader_model, request.version, required
        )));
    }

    if request.wireframe && !caps.polygon_mode_line {
        return Err(unsupported("adapter cannot rasterize polygons as lines".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(shader_model: wgpu::ShaderModel) -> AdapterCaps {
        AdapterCaps {
            shader_model,
            polygon_mode_line: true,
        }
    }

    #[test]
    fn every_released_core_version_is_supported_on_desktop() {
        for (major, minors) in [(3u32, 2u32..=3), (4, 0..=6)] {
            for minor in minors {
                let request = ContextRequest::new(major, minor, Profile::Core);
                assert!(
                    check_support(&request, &AdapterCaps::desktop()).is_ok(),
                    "{request} should be supported"
                );
            }
        }
    }

    #[test]
    fn compatibility_profile_accepts_old_versions() {
        let request = ContextRequest::new(2, 1, Profile::Compatibility);
        assert!(check_support(&request, &caps(wgpu::ShaderModel::Sm2)).is_ok());
    }

    #[test]
    fn core_profile_below_3_2_is_rejected() {
        let request = ContextRequest::new(3, 1, Profile::Core);
        let err = check_support(&request, &AdapterCaps::desktop()).unwrap_err();
        assert!(matches!(err, GfxError::Unsupported { .. }));
    }

    #[test]
    fn unreleased_version_is_rejected() {
        for (major, minor) in [(4, 7), (5, 0), (1, 5)] {
            let request = ContextRequest::new(major, minor, Profile::Compatibility);
            assert!(check_support(&request, &AdapterCaps::desktop()).is_err());
        }
    }

    #[test]
    fn weak_adapter_cannot_host_4_6() {
        let request = ContextRequest::new(4, 6, Profile::Core);
        assert!(check_support(&request, &caps(wgpu::ShaderModel::Sm4)).is_err());
        assert!(check_support(&ContextRequest::new(3, 3, Profile::Core), &caps(wgpu::ShaderModel::Sm4)).is_ok());
    }

    #[test]
    fn wireframe_needs_line_polygon_mode() {
        let request = ContextRequest::new(4, 6, Profile::Core).with_wireframe();
        let no_lines = AdapterCaps {
            shader_model: wgpu::ShaderModel::Sm5,
            polygon_mode_line: false,
        };
        assert!(check_support(&request, &no_lines).is_err());
        assert_eq!(request.required_features(), wgpu::Features::POLYGON_MODE_LINE);
    }

    #[test]
    fn display_names_version_and_profile() {
        let request = ContextRequest::new(4, 6, Profile::Core).with_wireframe();
        assert_eq!(request.to_string(), "4.6 core +wireframe");
    }
}
