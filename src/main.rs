//! Headless runner: picks a GPU adapter, loads a `SimulationConfig` from disk (or
//! falls back to defaults), seeds W from an optional level image, steps the
//! pipeline a fixed number of frames, and writes a final snapshot. Replaces the
//! teacher's windowed event loop entirely: there is no surface, no camera, no
//! interactive input here, only the simulation's own frame loop.
use sandmelt::clock::FrameClock;
use sandmelt::config::SimulationConfig;
use sandmelt::pipeline::PipelineDriver;
use sandmelt::wgpu_utils::pipelines::PipelineManager;
use sandmelt::wgpu_utils::shader::ShaderDirectory;
use std::path::Path;

fn load_config() -> SimulationConfig {
    match std::fs::read_to_string("sandmelt.json") {
        Ok(text) => match SimulationConfig::from_json(&text) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("failed to parse sandmelt.json, falling back to defaults: {}", err);
                SimulationConfig::default()
            }
        },
        Err(_) => SimulationConfig::default(),
    }
}

async fn request_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(wgpu::BackendBit::PRIMARY);
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
        })
        .await
        .expect("no compatible GPU adapter found");

    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("sandmelt device"),
                features: wgpu::Features::TIMESTAMP_QUERY,
                limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
        .expect("failed to request device")
}

fn run(frame_count: u64) {
    let config = load_config();
    if let Err(err) = config.validate() {
        panic!("invalid simulation config: {}", err);
    }

    let (device, queue) = pollster::block_on(request_device());
    let shader_dir = ShaderDirectory::new(Path::new("shaders"));
    let mut pipeline_manager = PipelineManager::new();
    let mut driver = PipelineDriver::new(&device, &queue, &shader_dir, &mut pipeline_manager, &config);

    if let Ok(image) = image::open("level.png") {
        if let Err(err) = driver.world_mirror_mut().load_level_image(&image.to_rgba8()) {
            log::warn!("ignoring level.png: {}", err);
        }
    }

    let mut clock = FrameClock::new();
    for frame in 0..frame_count {
        if shader_dir.detected_change() {
            pipeline_manager.reload_changed(&device, &shader_dir);
        }
        driver.step_frame(&device, &queue, &pipeline_manager, &config);
        if let Some(sample) = clock.on_frame_submitted() {
            log::info!("frame {}: {:.1} fps", frame, sample.frames_per_second);
        }
    }

    driver.read_back_world(&device, &queue);
    driver.world_mirror().save_level_image().save("out.png").expect("failed to write out.png");
}

fn main() {
    env_logger::init();
    let frame_count: u64 = std::env::args().nth(1).and_then(|arg| arg.parse().ok()).unwrap_or(60);
    run(frame_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_falls_back_to_defaults_without_a_config_file() {
        let dir = std::env::temp_dir().join("sandmelt_test_no_config");
        std::fs::create_dir_all(&dir).unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();
        let config = load_config();
        std::env::set_current_dir(previous).unwrap();
        assert_eq!(config.world_size, SimulationConfig::default().world_size);
    }
}
