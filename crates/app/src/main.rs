//! Entry point for pskview.
//! Loads PSK meshes headlessly and prints what was uploaded.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use renderer::{LoadContext, LoaderConfig, MeshAsset, Model, WgpuBackend};

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_strict_arg(args: &[String]) -> bool {
    // --strict[=on|off], off by default
    for arg in args {
        if arg == "--strict" {
            return true;
        }
        if let Some(val) = arg.strip_prefix("--strict=") {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

fn parse_asset_root_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .rev()
        .find_map(|arg| arg.strip_prefix("--asset-root="))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_mesh_args(args: &[String]) -> Vec<PathBuf> {
    args.iter()
        .filter(|arg| !arg.starts_with("--"))
        .map(PathBuf::from)
        .collect()
}

fn report(mesh: &MeshAsset, backend: &WgpuBackend) {
    println!("{}", mesh.path().display());
    let vb_bytes = backend.with_buffer(mesh.vertex_buffer(), |b| b.size()).unwrap_or(0);
    let ib_bytes = backend.with_buffer(mesh.index_buffer(), |b| b.size()).unwrap_or(0);
    println!(
        "  vertices: {} ({} bytes)  indices: {} ({} bytes)",
        mesh.vertex_count(),
        vb_bytes,
        mesh.index_count(),
        ib_bytes
    );
    let bounds = mesh.bounds();
    if bounds.is_empty() {
        println!("  bounds: empty");
    } else {
        println!("  bounds: {} .. {}", bounds.min, bounds.max);
    }
    for (material_index, range) in mesh.index_ranges() {
        println!("  batch: material {material_index} indices {range:?}");
    }
    for (i, material) in mesh.materials().iter().enumerate() {
        let array = material.texture_array_info();
        let mips = backend
            .with_texture(array.handle, |t| t.texture.mip_level_count())
            .unwrap_or(0);
        println!(
            "  material {i} {}: array {} ({}x{}, {} mips, {}/{} layers: {})",
            material.name(),
            array.handle,
            array.width,
            array.height,
            mips,
            array.filled,
            array.layers,
            material.array_channels().join(", ")
        );
        for (slot, aux) in material.aux_textures().iter().enumerate() {
            println!(
                "    slot {}: {} {} ({})",
                slot + 1,
                aux.channel,
                aux.handle,
                aux.path.display()
            );
        }
    }
    let diag = mesh.diagnostics();
    if diag.is_clean() {
        println!("  clean load");
    } else {
        println!("  {} warnings:", diag.len());
        for warning in diag.iter() {
            println!("    [{}] {}", warning.kind(), warning);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let backends = parse_backend_arg(&args);
    let config = LoaderConfig {
        asset_root: parse_asset_root_arg(&args),
        strict: parse_strict_arg(&args),
    };
    let meshes = parse_mesh_args(&args);
    if meshes.is_empty() {
        bail!("usage: app [--gpu-backend=..] [--asset-root=DIR] [--strict] <file.psk>...");
    }
    log::info!(
        "Starting pskview. Backend: {:?}, asset_root={:?}, strict={}",
        backends,
        config.asset_root,
        config.strict
    );

    let backend = Arc::new(WgpuBackend::new_headless(backends)?);
    let mut model = Model::new(LoadContext::new(backend.clone(), config));
    for path in &meshes {
        let mesh = model
            .add_mesh(path)
            .with_context(|| format!("loading {}", path.display()))?;
        report(mesh, &backend);
    }

    let bounds = model.bounds();
    if !bounds.is_empty() {
        println!("model bounds: {} .. {}", bounds.min, bounds.max);
    }
    println!(
        "cached textures: {}  live GPU textures: {}  live buffers: {}",
        model.context().cache.len(),
        backend.live_textures(),
        backend.live_buffers()
    );

    drop(model);
    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
