use crate::{BenchmarkDriver, BenchmarkRunner, Error, Result};

/// Records the calls it receives.
#[derive(Default)]
struct Recorder {
    valid: bool,
    fail_set_up: bool,
    fail_code_at: Option<usize>,
    calls: Vec<&'static str>,
    iterations: usize,
}

impl BenchmarkDriver for Recorder {
    fn set_up(&mut self) -> Result<()> {
        self.calls.push("set_up");
        if self.fail_set_up {
            return Err(Error::NotSetUp { benchmark: "recorder".into() });
        }
        Ok(())
    }

    fn code(&mut self) -> Result<()> {
        self.calls.push("code");
        self.iterations += 1;
        if self.fail_code_at == Some(self.iterations) {
            return Err(Error::NotSetUp { benchmark: "recorder".into() });
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<bool> {
        self.calls.push("validate");
        Ok(self.valid)
    }

    fn tear_down(&mut self) -> Result<()> {
        self.calls.push("tear_down");
        Ok(())
    }

    fn device_name(&self) -> String {
        "recorder".into()
    }
}

#[test]
fn test_valid_run_times_iterations() {
    let mut driver = Recorder { valid: true, ..Default::default() };
    let summary = BenchmarkRunner::new(2).run(&mut driver).unwrap();

    assert_eq!(driver.calls, ["set_up", "validate", "code", "code", "tear_down"]);
    assert_eq!(summary.runs.len(), 2);
    assert!(summary.is_valid());
}

#[test]
fn test_invalid_run_skips_timing() {
    let mut driver = Recorder::default();
    let summary = BenchmarkRunner::new(5).run(&mut driver).unwrap();

    assert_eq!(driver.calls, ["set_up", "validate", "tear_down"]);
    assert_eq!(summary.to_string(), "id=recorder produced invalid result");
}

#[test]
fn test_failed_iteration_still_tears_down() {
    let mut driver = Recorder { valid: true, fail_code_at: Some(2), ..Default::default() };
    assert!(BenchmarkRunner::new(5).run(&mut driver).is_err());
    assert_eq!(driver.calls.last(), Some(&"tear_down"));
    assert_eq!(driver.iterations, 2);
}

#[test]
fn test_failed_set_up_still_tears_down() {
    let mut driver = Recorder { valid: true, fail_set_up: true, ..Default::default() };
    let err = BenchmarkRunner::new(3).run(&mut driver).unwrap_err();

    assert!(matches!(err, Error::NotSetUp { .. }));
    assert_eq!(driver.calls, ["set_up", "tear_down"]);
}
