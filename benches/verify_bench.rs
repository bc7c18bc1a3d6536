use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use raster_verify::{
    Check, LinePrimitive, Scalar, Scene, Size, TrianglePrimitive, VerificationArguments,
    VerificationMode, Vertex, render_reference, verify,
};

fn many_triangles_benchmark(c: &mut Criterion) {
    let mut rnd = Rnd::new();
    let size = Size::new(256, 256);
    let count = 256;

    let mut vertex = || {
        Vertex::xy(rnd.uniform() * 2.0 - 1.0, rnd.uniform() * 2.0 - 1.0).with_color([
            rnd.uniform() as f32,
            rnd.uniform() as f32,
            rnd.uniform() as f32,
            1.0,
        ])
    };
    let triangles: Vec<_> = (0..count)
        .map(|_| TrianglePrimitive::new([vertex(), vertex(), vertex()]))
        .collect();
    let lines: Vec<_> = (0..count)
        .map(|_| LinePrimitive::new([vertex(), vertex()]))
        .collect();

    let mut group = c.benchmark_group("many-triangles");
    group.throughput(Throughput::Elements(count));
    for samples in [0, 4] {
        let args = VerificationArguments::new(8, [8, 8, 8]).with_samples(samples);
        let scene = Scene::triangles(triangles.clone());
        let image = render_reference(&scene, &args, size).expect("valid scene");
        group.bench_function(format!("strict-{}", samples), |b| {
            b.iter(|| verify(Check::Coverage, &image, &scene, &args))
        });
        let scene = scene.with_mode(VerificationMode::Weaker);
        group.bench_function(format!("weaker-{}", samples), |b| {
            b.iter(|| verify(Check::Coverage, &image, &scene, &args))
        });
    }
    group.finish();

    let mut group = c.benchmark_group("many-lines");
    group.throughput(Throughput::Elements(count));
    let args = VerificationArguments::new(8, [8, 8, 8]);
    let scene = Scene::lines(lines).with_line_width(3.0);
    let image = render_reference(&scene, &args, size).expect("valid scene");
    group.bench_function("coverage", |b| {
        b.iter(|| verify(Check::Coverage, &image, &scene, &args))
    });
    group.bench_function("interpolation", |b| {
        b.iter(|| verify(Check::Interpolation, &image, &scene, &args))
    });
    group.finish();
}

criterion_group!(benches, many_triangles_benchmark);
criterion_main!(benches);

/// Very basic random number generator
#[derive(Default)]
pub struct Rnd {
    state: u32,
}

impl Rnd {
    /// Create new random number generator with seed `0`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_u32(&mut self) -> u32 {
        // xorshift with a non-zero state
        let mut x = self.state.wrapping_add(0x9e37_79b9);
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniformly distributed value in `[0, 1]`
    pub fn uniform(&mut self) -> Scalar {
        self.next_u32() as Scalar / u32::MAX as Scalar
    }
}
