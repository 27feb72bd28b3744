#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("tess_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use ghx_tessellate::geom::{
        GeomContext, GeomMesh, GeomMeshDiagnostics, SplitTieBreak, SurfacePreset,
        TessellationOptions, tessellate_with_context,
    };
    use std::fmt::{self, Write as _};
    use std::fs::{self, File};
    use std::io::{self, BufWriter, Write};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;
    const DEFAULT_MAX_ERROR: f64 = 0.01;

    const USAGE: &str = r#"tess_cli (ghx-tessellate)

USAGE:
  tess_cli list
  tess_cli run <surface|all> [options]

OPTIONS (run):
  --error <value>        Maximum chord deviation (default 0.01)
  --max-depth <n>        Deepest edge subdivision level
  --max-cells <n>        Upper bound on the number of cells
  --tie-break <mode>     first_candidate | shortest_split
  --out-dir <dir>        Write <surface>.obj and <surface>.snap here (required for `all`)
  --obj <path>           Write OBJ (single surface only)
  --snap <path>          Write snapshot (single surface only)
  --no-obj               Skip OBJ when using --out-dir
  --no-snap              Skip snapshot when using --out-dir
  --overwrite            Overwrite existing output files
  -v, --verbose          Print full diagnostics
  -h, --help             Show this help
"#;

    pub fn run() -> Result<(), String> {
        let mut args = Args::new(std::env::args().skip(1).collect());
        match args.next().as_deref() {
            None | Some("-h" | "--help" | "help") => println!("{USAGE}"),
            Some("list") => {
                for preset in SurfacePreset::ALL {
                    println!("{}", preset.name());
                }
            }
            Some("run") => cmd_run(&mut args)?,
            Some(other) => return Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
        Ok(())
    }

    /// Where the results of a run go.
    #[derive(Debug, PartialEq)]
    enum Target {
        /// Snapshot to stdout unless verbose.
        Stdout,
        Files {
            obj: Option<PathBuf>,
            snap: Option<PathBuf>,
        },
        Dir {
            dir: PathBuf,
            obj: bool,
            snap: bool,
        },
    }

    #[derive(Debug)]
    struct RunRequest {
        surfaces: Vec<SurfacePreset>,
        max_error: f64,
        options: TessellationOptions,
        target: Target,
        overwrite: bool,
        verbose: bool,
    }

    fn parse_run(args: &mut Args) -> Result<Option<RunRequest>, String> {
        let surface = args.next().ok_or("missing surface name")?;
        let mut max_error = DEFAULT_MAX_ERROR;
        let mut options = TessellationOptions::default();
        let (mut out_dir, mut obj, mut snap) = (None, None, None);
        let (mut no_obj, mut no_snap, mut overwrite, mut verbose) = (false, false, false, false);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--error" => max_error = args.number("--error")?,
                "--max-depth" => options = options.with_max_depth(args.count("--max-depth")?),
                "--max-cells" => options = options.with_max_cells(args.count("--max-cells")?),
                "--tie-break" => {
                    options = options.with_tie_break(parse_tie_break(&args.value("--tie-break")?)?);
                }
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap = Some(PathBuf::from(args.value("--snap")?)),
                "--no-obj" => no_obj = true,
                "--no-snap" => no_snap = true,
                "--overwrite" => overwrite = true,
                "-v" | "--verbose" => verbose = true,
                "-h" | "--help" => {
                    println!("{USAGE}");
                    return Ok(None);
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let target = match out_dir {
            Some(_) if obj.is_some() || snap.is_some() => {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            Some(_) if no_obj && no_snap => {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }
            Some(dir) => Target::Dir {
                dir,
                obj: !no_obj,
                snap: !no_snap,
            },
            None if obj.is_none() && snap.is_none() => Target::Stdout,
            None => Target::Files { obj, snap },
        };

        let surfaces = if surface == "all" {
            if !matches!(target, Target::Dir { .. }) {
                return Err("`run all` requires --out-dir".to_string());
            }
            SurfacePreset::ALL.to_vec()
        } else {
            vec![SurfacePreset::from_name(&surface).ok_or_else(|| unknown_surface(&surface))?]
        };

        Ok(Some(RunRequest {
            surfaces,
            max_error,
            options,
            target,
            overwrite,
            verbose,
        }))
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let Some(request) = parse_run(args)? else {
            return Ok(());
        };
        if let Target::Dir { dir, .. } = &request.target {
            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;
        }

        for &preset in &request.surfaces {
            let output = run_surface(preset, request.max_error, request.options)?;
            let (obj, snap) = match &request.target {
                Target::Stdout => {
                    if !request.verbose {
                        print!("{}", output.snapshot);
                    }
                    (None, None)
                }
                Target::Files { obj, snap } => (obj.clone(), snap.clone()),
                Target::Dir { dir, obj, snap } => (
                    obj.then(|| dir.join(format!("{}.obj", output.name))),
                    snap.then(|| dir.join(format!("{}.snap", output.name))),
                ),
            };
            if let Some(path) = snap {
                let mut file = create_output(&path, request.overwrite)?;
                file.write_all(output.snapshot.as_bytes())
                    .and_then(|()| file.flush())
                    .map_err(|e| format!("write {}: {e}", path.display()))?;
                eprintln!("wrote {}", path.display());
            }
            if let Some(path) = obj {
                let mut file = create_output(&path, request.overwrite)?;
                write_obj(&mut file, &output.mesh, output.name)
                    .and_then(|()| file.flush())
                    .map_err(|e| format!("write {}: {e}", path.display()))?;
                eprintln!("wrote {}", path.display());
            }

            if request.verbose {
                eprint!("{}: {}", output.name, output.diag);
            } else {
                eprintln!("{}: {}", output.name, output.diag.summary());
            }
        }
        Ok(())
    }

    fn parse_tie_break(mode: &str) -> Result<SplitTieBreak, String> {
        match mode {
            "first_candidate" => Ok(SplitTieBreak::FirstCandidate),
            "shortest_split" => Ok(SplitTieBreak::ShortestSplit),
            other => Err(format!(
                "unknown tie-break `{other}` (expected first_candidate or shortest_split)"
            )),
        }
    }

    fn unknown_surface(name: &str) -> String {
        let names: Vec<&str> = SurfacePreset::ALL.iter().map(|preset| preset.name()).collect();
        format!("unknown surface `{name}` (available: {})", names.join(", "))
    }

    struct SurfaceOutput {
        name: &'static str,
        mesh: GeomMesh,
        diag: GeomMeshDiagnostics,
        snapshot: String,
    }

    fn run_surface(
        preset: SurfacePreset,
        max_error: f64,
        options: TessellationOptions,
    ) -> Result<SurfaceOutput, String> {
        let name = preset.name();
        let function = preset.function();
        let mut ctx = GeomContext::new();
        let (mesh, diag) = tessellate_with_context(function.as_ref(), &max_error, options, &mut ctx)
            .map_err(|e| format!("{name}: {e}"))?;
        mesh.validate()
            .map_err(|e| format!("{name}: mesh validation failed: {e}"))?;

        let mut snapshot = String::new();
        // Writing into a String cannot fail.
        let _ = write_snapshot(&mut snapshot, name, max_error, &diag, &mesh);
        Ok(SurfaceOutput {
            name,
            mesh,
            diag,
            snapshot,
        })
    }

    fn create_output(path: &Path, overwrite: bool) -> Result<BufWriter<File>, String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    /// Wavefront OBJ with one `vt` per vertex holding its surface parameters.
    fn write_obj<W: Write>(w: &mut W, mesh: &GeomMesh, name: &str) -> io::Result<()> {
        writeln!(w, "# ghx-tessellate tess_cli")?;
        writeln!(w, "o {name}")?;
        for [x, y, z] in &mesh.positions {
            writeln!(w, "v {x} {y} {z}")?;
        }
        for [u, v] in mesh.uvs.iter().flatten() {
            writeln!(w, "vt {u} {v}")?;
        }
        for [x, y, z] in mesh.normals.iter().flatten() {
            writeln!(w, "vn {x} {y} {z}")?;
        }

        let corner = |i: u32| {
            let i = i + 1;
            match (mesh.uvs.is_some(), mesh.normals.is_some()) {
                (true, true) => format!("{i}/{i}/{i}"),
                (true, false) => format!("{i}/{i}"),
                (false, true) => format!("{i}//{i}"),
                (false, false) => i.to_string(),
            }
        };
        for [a, b, c] in mesh.triangles() {
            writeln!(w, "f {} {} {}", corner(a), corner(b), corner(c))?;
        }
        Ok(())
    }

    /// Rounds to the snapshot grid; -0.0 comes out as 0.0.
    fn quantize(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE + 0.0
    }

    fn write_values(out: &mut String, tag: &str, values: &[f64]) -> fmt::Result {
        out.push_str(tag);
        for &value in values {
            write!(out, " {:.SNAPSHOT_DECIMALS$}", quantize(value))?;
        }
        out.push('\n');
        Ok(())
    }

    /// Line-oriented text form of a run, stable enough to diff between builds.
    fn write_snapshot(
        out: &mut String,
        surface: &str,
        max_error: f64,
        diag: &GeomMeshDiagnostics,
        mesh: &GeomMesh,
    ) -> fmt::Result {
        writeln!(out, "# ghx-tessellate snapshot v1")?;
        writeln!(out, "surface {surface}")?;
        writeln!(out, "max_error {max_error:e}")?;
        writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}")?;

        let counts = [
            ("vertex_count", diag.vertex_count),
            ("triangle_count", diag.triangle_count),
            ("degenerate_triangle_count", diag.degenerate_triangle_count),
            ("open_edge_count", diag.open_edge_count),
            ("non_manifold_edge_count", diag.non_manifold_edge_count),
            ("basis_triangle_count", diag.basis_triangle_count),
            ("root_edge_count", diag.root_edge_count),
            ("discarded_edge_count", diag.discarded_edge_count),
            ("split_count", diag.split_count),
            ("forced_bisection_count", diag.forced_bisection_count),
            ("surface_evaluations", diag.surface_evaluations),
            ("max_sample_depth", diag.max_sample_depth),
            ("warning_count", diag.warnings.len()),
        ];
        for (key, count) in counts {
            writeln!(out, "diag.{key} {count}")?;
        }
        if let Some(volume) = diag.enclosed_volume {
            write_values(out, "diag.enclosed_volume", &[volume])?;
        }
        for (idx, warning) in diag.warnings.iter().enumerate() {
            writeln!(out, "diag.warning.{idx} {warning}")?;
        }

        writeln!(out, "mesh.positions {}", mesh.positions.len())?;
        for p in &mesh.positions {
            write_values(out, "p", p)?;
        }
        writeln!(out, "mesh.indices {}", mesh.indices.len())?;
        for [a, b, c] in mesh.triangles() {
            writeln!(out, "i {a} {b} {c}")?;
        }
        match &mesh.uvs {
            Some(uvs) => {
                writeln!(out, "mesh.uvs {}", uvs.len())?;
                for uv in uvs {
                    write_values(out, "uv", uv)?;
                }
            }
            None => writeln!(out, "mesh.uvs none")?,
        }
        match &mesh.normals {
            Some(normals) => {
                writeln!(out, "mesh.normals {}", normals.len())?;
                for n in normals {
                    write_values(out, "n", n)?;
                }
            }
            None => writeln!(out, "mesh.normals none")?,
        }
        Ok(())
    }

    struct Args {
        args: std::vec::IntoIter<String>,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self {
                args: args.into_iter(),
            }
        }

        fn next(&mut self) -> Option<String> {
            self.args.next()
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }

        fn number(&mut self, flag: &str) -> Result<f64, String> {
            let raw = self.value(flag)?;
            raw.parse()
                .map_err(|_| format!("{flag} expects a number, got `{raw}`"))
        }

        fn count(&mut self, flag: &str) -> Result<usize, String> {
            let raw = self.value(flag)?;
            raw.parse()
                .map_err(|_| format!("{flag} expects a whole number, got `{raw}`"))
        }
    }

}
