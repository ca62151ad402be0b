//! In-memory connectors and bar builders shared by the behavior tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use qnt_core::{
    DataSource, FetchRequest, Instrument, Pagination, RawBar, SourceClass, SourceError, Symbol,
    UtcDateTime,
};

/// How a fake connector answers for one symbol.
#[derive(Clone)]
pub enum Script {
    /// Full history; paged sources serve it by cursor and limit.
    History(Vec<RawBar>),
    /// Same bars on every call, cursor ignored.
    Fixed(Vec<RawBar>),
    Fail(SourceError),
    /// Answers with the history after `delay`.
    Delayed(Duration, Vec<RawBar>),
    /// Waits for every other `Rendezvous` fetch before answering.
    Rendezvous(Arc<tokio::sync::Barrier>, Vec<RawBar>),
    /// Never answers; raises the flag when the fetch is dropped.
    Hang(Arc<AtomicBool>),
    Panic,
}

pub struct FakeSource {
    class: SourceClass,
    pagination: Pagination,
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl FakeSource {
    pub fn batch(class: SourceClass) -> Self {
        Self::new(class, Pagination::Batch)
    }

    pub fn paged(class: SourceClass, max_page_size: usize) -> Self {
        Self::new(class, Pagination::Paged { max_page_size })
    }

    fn new(class: SourceClass, pagination: Pagination) -> Self {
        Self {
            class,
            pagination,
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, ticker: &str, script: Script) -> Self {
        let symbol = Symbol::parse(ticker).expect("valid test symbol");
        self.scripts.insert(symbol.as_str().to_owned(), script);
        self
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().expect("lock").clone()
    }

    fn page(&self, history: &[RawBar], req: &FetchRequest) -> Vec<RawBar> {
        match (self.pagination, req.since) {
            (Pagination::Paged { .. }, Some(since)) => history
                .iter()
                .filter(|bar| bar.ts >= since)
                .take(req.limit.unwrap_or(usize::MAX))
                .cloned()
                .collect(),
            _ => history.to_vec(),
        }
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl DataSource for FakeSource {
    fn id(&self) -> SourceClass {
        self.class
    }

    fn name(&self) -> &'static str {
        "fake"
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }

    fn fetch<'a>(
        &'a self,
        req: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawBar>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().expect("lock").push(req.clone());
            let script = self.scripts.get(req.symbol.as_str()).cloned();

            match script {
                None => Ok(Vec::new()),
                Some(Script::History(history)) => Ok(self.page(&history, &req)),
                Some(Script::Fixed(bars)) => Ok(bars),
                Some(Script::Fail(error)) => Err(error),
                Some(Script::Delayed(delay, history)) => {
                    tokio::time::sleep(delay).await;
                    Ok(self.page(&history, &req))
                }
                Some(Script::Rendezvous(barrier, history)) => {
                    barrier.wait().await;
                    Ok(self.page(&history, &req))
                }
                Some(Script::Hang(flag)) => {
                    let _guard = DropFlag(flag);
                    std::future::pending::<Result<Vec<RawBar>, SourceError>>().await
                }
                Some(Script::Panic) => panic!("connector exploded"),
            }
        })
    }
}

pub fn day(offset: i64) -> UtcDateTime {
    UtcDateTime::from_ymd(2024, 1, 1)
        .expect("valid date")
        .plus_millis(offset * 86_400_000)
}

/// Continuous crypto-style bars on consecutive days starting at `start`.
pub fn daily_bars(start: i64, closes: &[f64]) -> Vec<RawBar> {
    closes
        .iter()
        .enumerate()
        .map(|(offset, close)| {
            RawBar::new(day(start + offset as i64), *close, *close, *close, *close, 100.0)
                .expect("valid bar")
        })
        .collect()
}

/// Equity-style bar carrying adjustment inputs.
pub fn equity_bar(offset: i64, close: f64, adj_close: f64, prior_close: f64) -> RawBar {
    RawBar::new(day(offset), close, close, close, close, 1_000.0)
        .expect("valid bar")
        .with_adjustment_inputs(adj_close, prior_close)
}

pub fn instrument(ticker: &str, class: SourceClass) -> Instrument {
    Instrument::new(Symbol::parse(ticker).expect("valid symbol"), class)
}
