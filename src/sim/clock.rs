/// A simulation clock that tracks fixed-duration steps over a horizon.
///
/// The `Clock` provides methods to advance time step-by-step or run
/// a function at each time step until completion.
///
/// # Examples
///
/// ```
/// use bess_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3, 0.5);
/// let mut hours = Vec::new();
///
/// clock.run(|step| hours.push(step as f64 * 0.5));
/// assert_eq!(hours, vec![0.0, 0.5, 1.0]);
/// ```
pub struct Clock {
    /// Current step of the simulation
    current: usize,
    /// Total steps to run in the simulation
    total: usize,
    /// Duration of one step in hours
    dt_hours: f64,
}

impl Clock {
    /// Creates a new clock with a specified total number of steps.
    ///
    /// # Arguments
    ///
    /// * `total` - The total number of steps the clock will run
    /// * `dt_hours` - Duration of one step in hours
    pub fn new(total: usize, dt_hours: f64) -> Self {
        Self {
            current: 0,
            total,
            dt_hours,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The current step number (starting from 0) before advancing
    /// * `None` - If the clock has reached its total steps
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some(step)
        } else {
            None
        }
    }

    /// Runs a function for each remaining step in the clock.
    ///
    /// # Arguments
    ///
    /// * `f` - A function that takes the current step number as an argument
    pub fn run(&mut self, mut f: impl FnMut(usize)) {
        while let Some(step) = self.tick() {
            f(step);
        }
    }

    /// Elapsed hours at the start of `step`.
    pub fn time_hr(&self, step: usize) -> f64 {
        step as f64 * self.dt_hours
    }

    /// Hour of day (0.0 to 24.0) at the start of `step`.
    pub fn hour_of_day(&self, step: usize) -> f64 {
        self.time_hr(step).rem_euclid(24.0)
    }
}

/// Whether `hour` lies in the daily window `[start, end)`.
///
/// Windows with `start > end` wrap across midnight; `start == end` is empty.
pub fn hour_in_window(hour: f64, start: f64, end: f64) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Hours from `hour` until the daily window ending at `end` closes.
pub fn hours_until(hour: f64, end: f64) -> f64 {
    let remaining = (end - hour).rem_euclid(24.0);
    if remaining == 0.0 { 24.0 } else { remaining }
}
