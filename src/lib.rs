#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;

use std::fmt;

use geom::{
    GeomMesh, GeomMeshDiagnostics, SurfacePreset, TessellationError, TessellationOptions,
    tessellate_with_options,
};
use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not initialize rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Flat buffers ready for a `BufferGeometry`.
#[derive(Debug, Serialize)]
struct MeshExport<'a> {
    positions: &'a [f64],
    indices: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    normals: Option<&'a [f64]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uvs: Option<&'a [f64]>,
}

impl<'a> From<&'a GeomMesh> for MeshExport<'a> {
    fn from(mesh: &'a GeomMesh) -> Self {
        Self {
            positions: mesh.positions_flat(),
            indices: &mesh.indices,
            normals: mesh.normals_flat(),
            uvs: mesh.uvs_flat(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SurfaceInfo {
    name: &'static str,
}

/// Tessellates one of the named demo surfaces and keeps the latest result.
#[wasm_bindgen]
pub struct TessEngine {
    initialized: bool,
    preset: SurfacePreset,
    max_error: f64,
    options: TessellationOptions,
    mesh: Option<GeomMesh>,
    diagnostics: Option<GeomMeshDiagnostics>,
}

#[wasm_bindgen]
impl TessEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> TessEngine {
        TessEngine {
            initialized: true,
            preset: SurfacePreset::UnitSphere,
            max_error: 0.01,
            options: TessellationOptions::default(),
            mesh: None,
            diagnostics: None,
        }
    }

    #[wasm_bindgen]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Names accepted by `set_surface`.
    #[wasm_bindgen]
    pub fn get_surfaces(&self) -> Result<JsValue, JsValue> {
        let surfaces: Vec<SurfaceInfo> = SurfacePreset::ALL
            .iter()
            .map(|preset| SurfaceInfo {
                name: preset.name(),
            })
            .collect();
        serde_wasm_bindgen::to_value(&surfaces).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn set_surface(&mut self, name: &str) -> Result<(), JsValue> {
        self.select_surface(name).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn set_max_error(&mut self, value: f64) -> Result<(), JsValue> {
        self.select_max_error(value).map_err(to_js_error)
    }

    /// Replaces the options with a (partial) options object; missing fields
    /// keep their defaults.
    #[wasm_bindgen]
    pub fn set_options(&mut self, options: JsValue) -> Result<(), JsValue> {
        let options: TessellationOptions =
            serde_wasm_bindgen::from_value(options).map_err(to_js_error)?;
        options.validate().map_err(to_js_error)?;
        self.options = options;
        self.invalidate();
        Ok(())
    }

    #[wasm_bindgen]
    pub fn tessellate(&mut self) -> Result<(), JsValue> {
        self.run().map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn get_mesh(&self) -> Result<JsValue, JsValue> {
        let mesh = self
            .mesh
            .as_ref()
            .ok_or_else(|| js_error("call tessellate() first"))?;
        serde_wasm_bindgen::to_value(&MeshExport::from(mesh)).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn get_diagnostics(&self) -> Result<JsValue, JsValue> {
        let diagnostics = self
            .diagnostics
            .as_ref()
            .ok_or_else(|| js_error("call tessellate() first"))?;
        serde_wasm_bindgen::to_value(diagnostics).map_err(to_js_error)
    }
}

impl Default for TessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TessEngine {
    fn select_surface(&mut self, name: &str) -> Result<(), String> {
        let preset = SurfacePreset::from_name(name)
            .ok_or_else(|| format!("unknown surface '{}'", name.trim()))?;
        if preset != self.preset {
            self.preset = preset;
            self.invalidate();
        }
        Ok(())
    }

    fn select_max_error(&mut self, value: f64) -> Result<(), TessellationError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(TessellationError::InvalidErrorBound { value });
        }
        self.max_error = value;
        self.invalidate();
        Ok(())
    }

    fn run(&mut self) -> Result<(), TessellationError> {
        let function = self.preset.function();
        let (mesh, diagnostics) =
            tessellate_with_options(function.as_ref(), &self.max_error, self.options)?;
        debug_log!(
            "{} @ {}: {}",
            self.preset.name(),
            self.max_error,
            diagnostics.summary()
        );
        self.mesh = Some(mesh);
        self.diagnostics = Some(diagnostics);
        Ok(())
    }

    fn invalidate(&mut self) {
        self.mesh = None;
        self.diagnostics = None;
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_starts_with_sphere() {
        let engine = TessEngine::new();
        assert!(engine.is_initialized());
        assert_eq!(engine.preset, SurfacePreset::UnitSphere);
        assert!(engine.mesh.is_none());
    }

    #[test]
    fn surface_selection_is_validated() {
        let mut engine = TessEngine::new();
        assert!(engine.select_surface("torus").is_ok());
        assert_eq!(engine.preset, SurfacePreset::Torus);
        let err = engine.select_surface("teapot").unwrap_err();
        assert!(err.contains("teapot"));
        assert_eq!(engine.preset, SurfacePreset::Torus);
    }

    #[test]
    fn bad_error_bound_keeps_previous_value() {
        let mut engine = TessEngine::new();
        assert!(matches!(
            engine.select_max_error(0.0),
            Err(TessellationError::InvalidErrorBound { .. })
        ));
        assert!(engine.select_max_error(f64::INFINITY).is_err());
        assert_eq!(engine.max_error, 0.01);
    }

    #[test]
    fn run_stores_mesh_until_settings_change() {
        let mut engine = TessEngine::new();
        engine.select_max_error(0.05).unwrap();
        engine.run().unwrap();
        let mesh = engine.mesh.as_ref().unwrap();
        let export = MeshExport::from(mesh);
        assert_eq!(export.positions.len(), mesh.vertex_count() * 3);
        assert!(export.normals.is_some());
        assert!(engine.diagnostics.as_ref().unwrap().is_watertight());

        engine.select_surface("sinc").unwrap();
        assert!(engine.mesh.is_none());
        assert!(engine.diagnostics.is_none());
    }
}
