//! Sliding-window indicators over swap prices aggregated into fixed-width
//! bars. Every indicator reports `None` until its warmup window is full;
//! strategies treat that as an instruction to hold.

use std::collections::VecDeque;

/// One closed high/low/close bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open_time: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Aggregates per-swap price samples into bars of `interval_s` seconds.
/// A bar closes when a sample lands in a later interval.
#[derive(Debug)]
pub struct BarAggregator {
    interval_s: i64,
    current: Option<Bar>,
}

impl BarAggregator {
    pub fn new(interval_s: i64) -> Self {
        Self {
            interval_s: interval_s.max(1),
            current: None,
        }
    }

    /// Feeds one price sample; returns the bar that closed, if any.
    pub fn update(&mut self, timestamp: i64, price: f64) -> Option<Bar> {
        let bucket = timestamp.div_euclid(self.interval_s) * self.interval_s;
        match self.current.as_mut() {
            Some(bar) if bar.open_time == bucket => {
                bar.high = bar.high.max(price);
                bar.low = bar.low.min(price);
                bar.close = price;
                None
            }
            _ => {
                let closed = self.current.take();
                self.current = Some(Bar {
                    open_time: bucket,
                    high: price,
                    low: price,
                    close: price,
                });
                closed
            }
        }
    }
}

/// Wilder's average true range. Seeded with the simple mean of the first
/// `period` true ranges, then smoothed: atr = ((n-1)*prev + tr) / n.
#[derive(Debug)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed: Vec<f64>,
    value: f64,
    initialized: bool,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            seed: Vec::new(),
            value: 0.0,
            initialized: false,
        }
    }

    pub fn update(&mut self, bar: &Bar) {
        let Some(prev_close) = self.prev_close.replace(bar.close) else {
            // First bar only provides the previous close.
            return;
        };

        let tr = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());

        if self.initialized {
            self.value = ((self.period as f64 - 1.0) * self.value + tr) / self.period as f64;
        } else {
            self.seed.push(tr);
            if self.seed.len() == self.period {
                self.value = self.seed.iter().sum::<f64>() / self.period as f64;
                self.initialized = true;
                self.seed.clear();
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.initialized.then_some(self.value)
    }
}

/// Simple moving average over closes.
#[derive(Debug)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            window: VecDeque::new(),
            sum: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) {
        self.window.push_back(close);
        self.sum += close;
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        (self.window.len() == self.period).then(|| self.sum / self.period as f64)
    }
}

/// Population standard deviation over closes.
#[derive(Debug)]
pub struct StdDev {
    period: usize,
    window: VecDeque<f64>,
}

impl StdDev {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            window: VecDeque::new(),
        }
    }

    pub fn update(&mut self, close: f64) {
        self.window.push_back(close);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.len() != self.period {
            return None;
        }
        let mean = self.window.iter().sum::<f64>() / self.period as f64;
        let variance = self
            .window
            .iter()
            .map(|close| (close - mean) * (close - mean))
            .sum::<f64>()
            / self.period as f64;
        Some(variance.sqrt())
    }
}

/// The indicator bundle a strategy snapshot exposes.
#[derive(Debug)]
pub struct IndicatorSet {
    bars: BarAggregator,
    atr: Atr,
    sma: Sma,
    std_dev: StdDev,
    closed_bars: u64,
}

impl IndicatorSet {
    pub fn new(bar_interval_s: i64, atr_period: usize, sma_period: usize) -> Self {
        Self {
            bars: BarAggregator::new(bar_interval_s),
            atr: Atr::new(atr_period),
            sma: Sma::new(sma_period),
            std_dev: StdDev::new(sma_period),
            closed_bars: 0,
        }
    }

    pub fn update(&mut self, timestamp: i64, price: f64) {
        if let Some(bar) = self.bars.update(timestamp, price) {
            self.closed_bars += 1;
            self.atr.update(&bar);
            self.sma.update(bar.close);
            self.std_dev.update(bar.close);
        }
    }

    pub fn atr(&self) -> Option<f64> {
        self.atr.value()
    }

    pub fn sma(&self) -> Option<f64> {
        self.sma.value()
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.std_dev.value()
    }

    pub fn closed_bars(&self) -> u64 {
        self.closed_bars
    }
}
