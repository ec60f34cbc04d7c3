use std::{
    fs::File,
    io::{
        self,
        BufWriter,
        Write,
    },
    path::Path,
};

use nalgebra::Point3;
use parking_lot::Mutex;

use crate::field::FieldScalar;

/// Gate serializing all probe output of the process.
static OUTPUT_GATE: Mutex<()> = Mutex::new(());

/// A plain-text sample stream for one probed cell.
///
/// The file starts with `# location=(x, y, z)` and `# dt=...` header lines,
/// followed by one `time value` sample per line (complex values print the
/// real and imaginary part).
#[derive(Debug)]
pub struct ProbeStream {
    writer: Mutex<BufWriter<File>>,
}

impl ProbeStream {
    pub fn create(
        path: impl AsRef<Path>,
        location: &Point3<f64>,
        dt: f64,
    ) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "# location=({}, {}, {})",
            location.x, location.y, location.z
        )?;
        writeln!(writer, "# dt={dt}")?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn record<S: FieldScalar>(&self, time: f64, value: &S) {
        let _gate = OUTPUT_GATE.lock();
        let mut writer = self.writer.lock();

        let result = write!(writer, "{time:e} ")
            .and_then(|_| value.write_sample(&mut *writer))
            .and_then(|_| writeln!(writer))
            .and_then(|_| writer.flush());

        if let Err(error) = result {
            tracing::warn!(%error, "failed to write probe sample");
        }
    }
}

/// A probe wrapped around one cell of a pointwise table; records the field
/// value there after every update sweep.
#[derive(Debug)]
pub struct ProbeAttachment {
    index: Point3<usize>,
    stream: ProbeStream,
}

impl ProbeAttachment {
    pub fn new(index: Point3<usize>, stream: ProbeStream) -> Self {
        Self { index, stream }
    }

    pub fn index(&self) -> &Point3<usize> {
        &self.index
    }

    pub fn record<S: FieldScalar>(&self, time: f64, value: &S) {
        self.stream.record(time, value);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use nalgebra::Point3;

    use super::ProbeStream;

    #[test]
    fn it_writes_headers_and_samples() {
        let path = std::env::temp_dir().join(format!(
            "fdtd3d-probe-{}-{:?}.dat",
            std::process::id(),
            std::thread::current().id()
        ));

        let stream = ProbeStream::create(&path, &Point3::new(-7.0, 0.0, 0.0), 0.05).unwrap();
        stream.record(0.05, &1.5f64);
        stream.record(0.1, &-0.25f64);
        drop(stream);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "# location=(-7, 0, 0)");
        assert_eq!(lines[1], "# dt=0.05");
        assert!(lines[2].starts_with("5e-2 1.5e0"));
        assert_eq!(lines.len(), 4);

        fs::remove_file(&path).unwrap();
    }
}
