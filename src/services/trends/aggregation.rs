// Trend Aggregation
// Batched classification of dated records into a year-by-label tally

use std::time::Instant;

use crate::error::{InferenceError, TrendError};
use crate::models::{ClassLabel, Prediction, TrendRecord, YearlyAggregate};
use crate::services::detection::Predictor;

use super::{FailurePolicy, TrendOptions, TrendTally};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordPrediction {
    pub year: i32,
    pub label: ClassLabel,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrendRun {
    pub tally: TrendTally,
    /// In input order, in-window records only.
    pub predictions: Vec<RecordPrediction>,
    pub skipped_out_of_window: usize,
    /// Records dropped under `FailurePolicy::Skip`.
    pub failed: usize,
}

impl TrendRun {
    fn absorb(&mut self, other: TrendRun) {
        self.tally.merge(&other.tally);
        self.predictions.extend(other.predictions);
        self.skipped_out_of_window += other.skipped_out_of_window;
        self.failed += other.failed;
    }

    pub fn aggregates(&self) -> Vec<YearlyAggregate> {
        self.tally.to_aggregates()
    }
}

/// Classify every in-window record. Out-of-window records are counted, never predicted.
pub fn classify_records(
    records: &[TrendRecord],
    predictor: &dyn Predictor,
    options: &TrendOptions,
) -> Result<TrendRun, TrendError> {
    let t0 = Instant::now();
    let mut run = TrendRun::default();

    let in_window: Vec<&TrendRecord> = records
        .iter()
        .filter(|r| {
            let keep = options.in_window(r.year);
            if !keep {
                run.skipped_out_of_window += 1;
            }
            keep
        })
        .collect();

    for (batch_no, batch) in in_window.chunks(options.batch_size.max(1)).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|r| r.cleaned_text.as_str()).collect();
        match predictor.predict_batch(&texts) {
            Ok(preds) => {
                check_len(&preds, batch.len(), &run)?;
                for (record, pred) in batch.iter().zip(preds) {
                    push(&mut run, record.year, &pred);
                }
            }
            Err(e) => match options.failure_policy {
                FailurePolicy::Abort => {
                    tracing::error!(batch = batch_no, error = %e, "Prediction batch failed, aborting");
                    return Err(TrendError::Aborted {
                        processed: run.predictions.len(),
                        partial: Box::new(run.tally),
                        source: e,
                    });
                }
                FailurePolicy::Skip => {
                    tracing::warn!(batch = batch_no, error = %e, "Prediction batch failed, retrying record by record");
                    for record in batch {
                        match predictor.predict(&record.cleaned_text) {
                            Ok(pred) => push(&mut run, record.year, &pred),
                            Err(e) => {
                                tracing::warn!(year = record.year, error = %e, "Record skipped");
                                run.failed += 1;
                            }
                        }
                    }
                }
            },
        }
    }

    tracing::info!(
        classified = run.predictions.len(),
        out_of_window = run.skipped_out_of_window,
        failed = run.failed,
        elapsed_ms = t0.elapsed().as_millis(),
        "Trend records classified"
    );
    Ok(run)
}

fn check_len(preds: &[Prediction], expected: usize, run: &TrendRun) -> Result<(), TrendError> {
    if preds.len() != expected {
        return Err(TrendError::Aborted {
            processed: run.predictions.len(),
            partial: Box::new(run.tally.clone()),
            source: InferenceError::Forward(format!(
                "predictor returned {} results for {} inputs",
                preds.len(),
                expected
            )),
        });
    }
    Ok(())
}

fn push(run: &mut TrendRun, year: i32, pred: &Prediction) {
    run.tally.add(year, pred.label);
    run.predictions.push(RecordPrediction {
        year,
        label: pred.label,
        confidence: pred.confidence,
    });
}

/// Year-by-label statistics, ascending by year.
pub fn aggregate(
    records: &[TrendRecord],
    predictor: &dyn Predictor,
    options: &TrendOptions,
) -> Result<Vec<YearlyAggregate>, TrendError> {
    Ok(classify_records(records, predictor, options)?.aggregates())
}

/// Split the corpus into contiguous shards classified on scoped worker threads
/// sharing one predictor. Tallies are merged; predictions keep input order.
pub fn classify_sharded(
    records: &[TrendRecord],
    predictor: &dyn Predictor,
    options: &TrendOptions,
    workers: usize,
) -> Result<TrendRun, TrendError> {
    let workers = workers.max(1);
    if workers == 1 || records.len() < 2 {
        return classify_records(records, predictor, options);
    }
    let shard_len = records.len().div_ceil(workers);

    let results: Vec<Result<TrendRun, TrendError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = records
            .chunks(shard_len)
            .map(|shard| scope.spawn(move || classify_records(shard, predictor, options)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(TrendError::Aborted {
                        processed: 0,
                        partial: Box::new(TrendTally::new()),
                        source: InferenceError::Forward("worker thread panicked".to_string()),
                    })
                })
            })
            .collect()
    });

    let mut combined = TrendRun::default();
    let mut first_error: Option<InferenceError> = None;
    let mut processed = 0;
    for result in results {
        match result {
            Ok(run) => {
                processed += run.predictions.len();
                combined.absorb(run);
            }
            Err(TrendError::Aborted {
                processed: p,
                partial,
                source,
            }) => {
                processed += p;
                combined.tally.merge(&partial);
                first_error.get_or_insert(source);
            }
            Err(other) => return Err(other),
        }
    }

    match first_error {
        Some(source) => Err(TrendError::Aborted {
            processed,
            partial: Box::new(combined.tally),
            source,
        }),
        None => Ok(combined),
    }
}

/// Re-aggregate stored `(year, label)` predictions without running the model.
/// Returns the tally and the number of rows outside the window.
pub fn tally_labels<I>(rows: I, options: &TrendOptions) -> (TrendTally, usize)
where
    I: IntoIterator<Item = (i32, ClassLabel)>,
{
    let mut tally = TrendTally::new();
    let mut skipped = 0;
    for (year, label) in rows {
        if options.in_window(year) {
            tally.add(year, label);
        } else {
            skipped += 1;
        }
    }
    (tally, skipped)
}
