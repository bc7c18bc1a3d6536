//! Verify reference rendering of a scene, optionally corrupted, and print the verdict as JSON
use raster_verify::*;
use std::{env, fs::File, io::Read};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

type Error = Box<dyn std::error::Error>;

#[derive(Debug)]
struct Args {
    input_file: String,
    check: Check,
    size: Size,
    samples: u32,
    subpixel_bits: u32,
    corrupt: usize,
    output_dir: Option<String>,
}

impl Args {
    fn parse() -> Result<Args, Error> {
        let mut result = Args {
            input_file: String::new(),
            check: Check::Coverage,
            size: Size::new(64, 64),
            samples: 0,
            subpixel_bits: 8,
            corrupt: 0,
            output_dir: None,
        };
        let mut positional = 0;
        let mut args = env::args();
        let cmd = args.next().unwrap_or_default();
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-h" => {
                    positional = 0;
                    break;
                }
                "-c" => {
                    let check = args.next().ok_or("-c requires argument")?;
                    result.check = match check.as_ref() {
                        "coverage" => Check::Coverage,
                        "lines" => Check::RelaxedLines,
                        "fill" => Check::FillRule(FillRuleCoverage::Full),
                        "fill-partial" => Check::FillRule(FillRuleCoverage::Partial),
                        "interpolation" => Check::Interpolation,
                        _ => return Err(format!("unknown check: {}", check).into()),
                    };
                }
                "-W" => {
                    let width = args.next().ok_or("-W requires argument")?;
                    result.size.width = width.parse()?;
                }
                "-H" => {
                    let height = args.next().ok_or("-H requires argument")?;
                    result.size.height = height.parse()?;
                }
                "-s" => {
                    let samples = args.next().ok_or("-s requires argument")?;
                    result.samples = samples.parse()?;
                }
                "-b" => {
                    let bits = args.next().ok_or("-b requires argument")?;
                    result.subpixel_bits = bits.parse()?;
                }
                "-n" => {
                    let corrupt = args.next().ok_or("-n requires argument")?;
                    result.corrupt = corrupt.parse()?;
                }
                "-o" => {
                    result.output_dir = Some(args.next().ok_or("-o requires argument")?);
                }
                _ => {
                    positional += 1;
                    match positional {
                        1 => result.input_file = arg,
                        _ => return Err("unexpected positional argument".into()),
                    }
                }
            }
        }
        if positional < 1 {
            eprintln!("Verify reference rendering of a scene and print the verdict");
            eprintln!("\nUSAGE:");
            eprintln!(
                "    {} [-c <check>] [-W <width>] [-H <height>] [-s <samples>] [-b <bits>] [-n <count>] [-o <dir>] <scene.json>",
                cmd
            );
            eprintln!("\nARGS:");
            eprintln!("    -c <check>     coverage|lines|fill|fill-partial|interpolation");
            eprintln!("    -W <width>     width of the image (default: 64)");
            eprintln!("    -H <height>    height of the image (default: 64)");
            eprintln!("    -s <samples>   number of samples of a resolved image");
            eprintln!("    -b <bits>      sub-pixel precision bits (default: 8)");
            eprintln!("    -n <count>     invert colors of every n-th pixel");
            eprintln!("    -o <dir>       directory for diagnostic images (png feature)");
            eprintln!("    <scene.json>   file containing scene ('-' means stdin)");
            std::process::exit(1);
        }
        Ok(result)
    }
}

/// Load scene from the file
fn scene_load(path: &str) -> Result<Scene, Error> {
    let mut contents = String::new();
    if path != "-" {
        File::open(path)?.read_to_string(&mut contents)?;
    } else {
        std::io::stdin().read_to_string(&mut contents)?;
    }
    Ok(tracing::debug_span!("[parse]").in_scope(|| serde_json::from_str(&contents))?)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    let scene = scene_load(&args.input_file)?;
    let verification = VerificationArguments::new(args.subpixel_bits, [8, 8, 8])
        .with_samples(args.samples);

    let reference = tracing::debug_span!("[render]")
        .in_scope(|| render_reference(&scene, &verification, args.size))?;
    let image = ImageOwned::new_with(args.size.height, args.size.width, |row, col| {
        let pixel = reference.get(row, col).copied().unwrap_or_default();
        let index = row * args.size.width + col;
        if args.corrupt > 0 && index % args.corrupt == 0 {
            let [r, g, b, a] = pixel.to_rgba();
            RGBA::new(255 - r, 255 - g, 255 - b, a)
        } else {
            pixel
        }
    });

    let verdict = match verify(args.check, &image, &scene, &verification) {
        Ok(verdict) => verdict,
        Err(error) if error.is_configuration() => {
            eprintln!("invalid scene or arguments: {}", error);
            std::process::exit(2);
        }
        Err(error) => return Err(error.into()),
    };
    println!("{}", serde_json::to_string_pretty(&verdict.to_json())?);

    #[cfg(feature = "png")]
    if let (Some(dir), Some(diagnostics)) = (&args.output_dir, &verdict.diagnostics) {
        diagnostics.write_png(dir)?;
    }
    #[cfg(not(feature = "png"))]
    if args.output_dir.is_some() {
        tracing::warn!("diagnostic images require png feature");
    }
    Ok(())
}
