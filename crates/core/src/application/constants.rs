// Adaptation constants (no magic values)
use std::time::Duration;

/// Upper bound on a wrapper validation run. A missing or hanging wrapper
/// must not block worker startup indefinitely.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Smoke-test script executed under the wrapper
pub const SMOKE_TEST_SCRIPT_NAME: &str = "test.py";
pub const SMOKE_TEST_SCRIPT_BODY: &str = "import time\n";

/// Prefix of per-attempt scratch directories
pub const SCRATCH_DIR_PREFIX: &str = "test-";

/// Marker file discovered when no `--project` is given
pub const PROJECT_MARKER_FILE: &str = "pyproject.toml";

/// Benchmark defaults
pub const BENCH_WARMUP: Duration = Duration::from_secs(10);
pub const BENCH_CALIBRATION: Duration = Duration::from_secs(1);
pub const BENCH_ROUND_DURATION: Duration = Duration::from_secs(2);
pub const BENCH_ROUNDS: usize = 4;
