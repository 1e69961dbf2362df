use notify::Watcher;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub enum ShaderStage {
    Vertex,
    Fragment,
}

// All entry points need to have this name.
pub const SHADER_ENTRY_POINT_NAME: &str = "main";

fn compile_glsl(glsl_code: &str, identifier: &str, stage: ShaderStage) -> Result<Vec<u32>, ()> {
    let kind = match stage {
        ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
        ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
    };

    let mut compiler = shaderc::Compiler::new().unwrap();
    let mut options = shaderc::CompileOptions::new().unwrap();
    options.set_warnings_as_errors();
    match compiler.compile_into_spirv(glsl_code, kind, identifier, SHADER_ENTRY_POINT_NAME, Some(&options)) {
        Ok(compile_result) => {
            if compile_result.get_num_warnings() > 0 {
                log::warn!("warnings when compiling {}:\n{}", identifier, compile_result.get_warning_messages());
            }
            Ok(compile_result.as_binary().to_vec())
        }
        Err(compile_error) => {
            log::error!("{}", compile_error);
            Err(())
        }
    }
}

fn load_glsl_and_resolve_includes(path: &Path) -> Result<String, ()> {
    match std::fs::read_to_string(&path) {
        Ok(glsl_code) => {
            lazy_static::lazy_static! {
                static ref INCLUDE_REGEX: Regex = Regex::new(r#"^\s*#\s*include\s+[<"](?P<file>.*)[>"]"#).unwrap();
            }

            let mut expanded_code = Vec::new();
            for (line_number, line) in glsl_code.lines().enumerate() {
                match INCLUDE_REGEX.captures(line) {
                    Some(captures) => {
                        expanded_code.push("#line 1".to_string());
                        let included_file = captures
                            .name("file")
                            .unwrap_or_else(|| panic!("invalid glsl include on line {} of {:?}", line_number, path))
                            .as_str();
                        match load_glsl_and_resolve_includes(&path.parent().unwrap().join(included_file)) {
                            Ok(included_code) => expanded_code.push(included_code),
                            Err(()) => {
                                log::error!("failed to process include {:?} at line {} of {:?}", included_file, line_number, path);
                                return Err(());
                            }
                        }
                        expanded_code.push(format!("#line {}", line_number + 2));
                    }
                    None => expanded_code.push(line.to_string()),
                }
            }

            Ok(expanded_code.join("\n"))
        }
        Err(err) => {
            log::error!("failed to read shader file {:?}: {}", path, err);
            Err(())
        }
    }
}

/// Watches a directory of GLSL fragment/vertex shaders and recompiles them to SPIR-V
/// with `shaderc`, resolving `#include` directives relative to the including file.
pub struct ShaderDirectory {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    detected_change: Arc<AtomicBool>,
    directory: PathBuf,
}

impl ShaderDirectory {
    pub fn new(path: &Path) -> ShaderDirectory {
        let detected_change = Arc::new(AtomicBool::new(false));
        let detected_change_evt_ref = detected_change.clone();
        let mut watcher: notify::RecommendedWatcher = notify::Watcher::new_immediate(move |res| match res {
            Ok(_) => detected_change_evt_ref.store(true, Ordering::Relaxed),
            Err(e) => log::warn!("failed to create shader directory watcher: {:?}", e),
        })
        .unwrap();
        let _ = watcher.watch(path, notify::RecursiveMode::Recursive);

        ShaderDirectory {
            watcher,
            detected_change,
            directory: PathBuf::from(path),
        }
    }

    /// Checks whether any change was detected in the shader directory since the last call.
    pub fn detected_change(&self) -> bool {
        self.detected_change.swap(false, Ordering::Relaxed)
    }

    pub fn load_shader_module(&self, device: &wgpu::Device, relative_filename: &Path) -> Result<wgpu::ShaderModule, ()> {
        let path = self.directory.join(relative_filename);

        let shader_stage = match path.extension().and_then(OsStr::to_str) {
            Some("frag") => ShaderStage::Fragment,
            Some("vert") => ShaderStage::Vertex,
            _ => {
                log::error!("did not recognize file extension for shader file {:?}", path);
                return Err(());
            }
        };

        let glsl_code = load_glsl_and_resolve_includes(&path)?;
        let spirv = compile_glsl(&glsl_code, relative_filename.to_str().unwrap(), shader_stage)?;

        Ok(device.create_shader_module(&wgpu::ShaderModuleSource::SpirV(std::borrow::Cow::Owned(spirv))))
    }
}
