/// Sensor module - collaborators that sample the reading for each frame

/// Source of the 16-bit reading carried in each telemetry frame
///
/// Called from the reporter loop; must return promptly. A stale value is
/// acceptable.
pub trait SensorSource {
    fn read_sensor(&mut self) -> u16;
}

impl<F> SensorSource for F
where
    F: FnMut() -> u16,
{
    fn read_sensor(&mut self) -> u16 {
        self()
    }
}

/// Always returns the same reading
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSensor(pub u16);

impl SensorSource for FixedSensor {
    fn read_sensor(&mut self) -> u16 {
        self.0
    }
}

/// Sawtooth reading between `min` and `max`, one step per sample
#[derive(Debug, Clone, Copy)]
pub struct CounterSensor {
    min: u16,
    max: u16,
    step: u16,
    current: u16,
}

impl CounterSensor {
    pub fn new(min: u16, max: u16, step: u16) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            step: step.max(1),
            current: min,
        }
    }
}

impl SensorSource for CounterSensor {
    fn read_sensor(&mut self) -> u16 {
        let reading = self.current;
        self.current = match self.current.checked_add(self.step) {
            Some(next) if next <= self.max => next,
            _ => self.min,
        };
        reading
    }
}
