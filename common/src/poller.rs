use crate::{
    device::{DeviceModel, SensorSample},
    error::DeviceIoError,
    port::PhysicalPort,
    types::{ChangeSet, SensorTuple},
};

/// Outcome of one poll tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PollTick {
    /// Full sensor tuple to report, present only when something changed.
    pub report: Option<ChangeSet>,
    pub errors: Vec<DeviceIoError>,
}

/// Change detection for the sensor set.
///
/// Starts with no last tuple, so the first sample always reports. Any field
/// difference reports the whole tuple.
#[derive(Debug, Clone)]
pub struct SensorPoller {
    last: Option<SensorTuple>,
    reports: u64,
}

impl Default for SensorPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPoller {
    pub fn new() -> Self {
        Self {
            last: None,
            reports: 0,
        }
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Forgets the last tuple so the next sample reports unconditionally.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// One pass of sample, compare, then report or idle. The tuple is kept as
    /// the last one whether or not it was reported.
    pub fn tick<P: PhysicalPort>(&mut self, device: &mut DeviceModel<P>) -> PollTick {
        let SensorSample { tuple, errors } = device.sample_sensors();
        let report = self.observe(tuple);
        PollTick { report, errors }
    }

    pub fn observe(&mut self, tuple: SensorTuple) -> Option<ChangeSet> {
        let changed = self.last.as_ref() != Some(&tuple);

        let report = if changed {
            self.reports = self.reports.saturating_add(1);
            Some(tuple.to_change_set())
        } else {
            None
        };

        self.last = Some(tuple);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BoardConfig,
        port::SimulatedPort,
        types::{MotionState, Property, Reading},
    };
    use pretty_assertions::assert_eq;

    fn tuple(temperature: f32, humidity: f32, motion: MotionState) -> SensorTuple {
        SensorTuple::new(Reading::Value(temperature), Reading::Value(humidity), motion)
    }

    #[test]
    fn reports_first_and_changed_ticks_only() {
        let mut poller = SensorPoller::new();

        let first = poller.observe(tuple(20.0, 40.0, MotionState::Clear));
        let second = poller.observe(tuple(20.0, 40.0, MotionState::Clear));
        let third = poller.observe(tuple(21.0, 40.0, MotionState::Clear));

        assert!(first.is_some());
        assert_eq!(second, None);
        assert!(third.is_some());
        assert_eq!(poller.reports(), 2);
    }

    #[test]
    fn report_carries_full_tuple() {
        let mut poller = SensorPoller::new();
        poller.observe(tuple(20.0, 40.0, MotionState::Clear));

        let report = poller.observe(tuple(20.0, 40.0, MotionState::Detected)).unwrap();

        assert_eq!(
            report.properties(),
            vec![Property::Temperature, Property::RelativeHumidity, Property::Motion]
        );
        assert_eq!(report.get(Property::Temperature), Some("20.0"));
        assert_eq!(report.get(Property::Motion), Some("true"));
    }

    #[test]
    fn reset_forces_next_report() {
        let mut poller = SensorPoller::new();
        poller.observe(tuple(20.0, 40.0, MotionState::Clear));
        poller.reset();

        assert!(poller.observe(tuple(20.0, 40.0, MotionState::Clear)).is_some());
    }

    #[test]
    fn tick_reads_device_and_reports_na() {
        let port = SimulatedPort::new().with_analog(0, 0.04).with_analog(1, 0.4);
        let mut device = DeviceModel::new(port, BoardConfig::default());
        let mut poller = SensorPoller::new();

        let tick = poller.tick(&mut device);
        let report = tick.report.unwrap();

        assert!(tick.errors.is_empty());
        assert_eq!(report.len(), 3);
        assert_eq!(report.get(Property::Motion), Some("na"));

        let again = poller.tick(&mut device);
        assert_eq!(again.report, None);
    }

    #[test]
    fn read_errors_do_not_trigger_reports() {
        let port = SimulatedPort::new()
            .with_analog(0, 0.04)
            .with_analog(1, 0.4)
            .with_digital(2, false);
        let mut device = DeviceModel::new(port, BoardConfig::default());
        let mut poller = SensorPoller::new();
        poller.tick(&mut device);

        device.port_mut().fail_pin(2, true);
        let tick = poller.tick(&mut device);

        assert_eq!(tick.errors.len(), 1);
        assert_eq!(tick.report, None);
    }
}
