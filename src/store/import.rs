//! Bulk import of friend lists.
//!
//! Inputs are resolved on a small bounded worker pool, then classified as
//! friends in input order. A failed entry is logged and skipped; nothing
//! already imported is rolled back.

use std::thread;

use crossbeam_channel::{bounded, unbounded};
use tracing::{info, warn};

use crate::error::ResolveError;
use crate::profile::{Affinity, PlayerId, Profile};
use crate::resolver::Resolver;

use super::AffinityStore;

/// Result of importing one input.
#[derive(Debug)]
pub struct ImportOutcome {
    /// The name or identity as supplied.
    pub input: String,
    /// The classified profile, or why it was skipped.
    pub result: Result<Profile, ResolveError>,
}

/// Per-item results of a bulk import, in input order.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// One entry per input.
    pub outcomes: Vec<ImportOutcome>,
}

impl ImportReport {
    /// Number of inputs that were classified.
    #[must_use]
    pub fn imported(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of inputs that were skipped.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.imported()
    }

    /// Returns true if every input was classified.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Skipped inputs with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ResolveError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.input.as_str(), e)))
    }
}

impl AffinityStore {
    /// Resolve each name and classify the result as a friend.
    pub fn import_by_name<I, S>(&self, names: I) -> ImportReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.import_with(names, |resolver, name| resolver.resolve_name(name), String::clone)
    }

    /// Resolve each identity and classify the result as a friend.
    pub fn import_by_identity<I>(&self, ids: I) -> ImportReport
    where
        I: IntoIterator<Item = PlayerId>,
    {
        let ids: Vec<PlayerId> = ids.into_iter().collect();
        self.import_with(
            ids,
            |resolver, id| {
                resolver.resolve_id(*id).map(|mut profile| {
                    profile.rekey(*id);
                    profile
                })
            },
            PlayerId::to_string,
        )
    }

    fn import_with<K, F, L>(&self, inputs: Vec<K>, resolve: F, label: L) -> ImportReport
    where
        K: Sync,
        F: Fn(&dyn Resolver, &K) -> Result<Profile, ResolveError> + Sync,
        L: Fn(&K) -> String,
    {
        let resolved = self.resolve_all(&inputs, &resolve);

        let mut report = ImportReport {
            outcomes: Vec::with_capacity(inputs.len()),
        };
        for (input, result) in inputs.iter().zip(resolved) {
            let input = label(input);
            let result = result.map(|profile| self.classify(profile.with_affinity(Affinity::Friend)));
            if let Err(e) = &result {
                warn!(%input, error = %e, "skipping import entry");
            }
            report.outcomes.push(ImportOutcome { input, result });
        }

        info!(imported = report.imported(), failed = report.failed(), "import finished");
        report
    }

    /// Resolve every input, preserving input order in the output.
    ///
    /// The calling thread works alongside up to `import_workers - 1` helpers.
    fn resolve_all<K, F>(&self, inputs: &[K], resolve: &F) -> Vec<Result<Profile, ResolveError>>
    where
        K: Sync,
        F: Fn(&dyn Resolver, &K) -> Result<Profile, ResolveError> + Sync,
    {
        let resolver = self.resolver();
        let resolver = resolver.as_ref();
        let helpers = self.config.import_workers.min(inputs.len()).saturating_sub(1);

        if helpers == 0 {
            return inputs.iter().map(|input| resolve(resolver, input)).collect();
        }

        let (job_tx, job_rx) = bounded::<usize>(inputs.len());
        for idx in 0..inputs.len() {
            // Capacity equals the job count, so this never blocks.
            let _ = job_tx.send(idx);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded();
        let mut slots: Vec<Option<Result<Profile, ResolveError>>> =
            inputs.iter().map(|_| None).collect();

        thread::scope(|scope| {
            let work = |job_rx: crossbeam_channel::Receiver<usize>,
                        result_tx: crossbeam_channel::Sender<(usize, Result<Profile, ResolveError>)>| {
                for idx in job_rx {
                    if result_tx.send((idx, resolve(resolver, &inputs[idx]))).is_err() {
                        break;
                    }
                }
            };

            for n in 0..helpers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("affinity-import-{n}"))
                    .spawn_scoped(scope, move || work(job_rx, result_tx));
                if let Err(e) = spawned {
                    warn!(error = %e, "failed to spawn import worker; continuing with fewer");
                    break;
                }
            }

            work(job_rx, result_tx);
        });

        for (idx, result) in result_rx.try_iter() {
            slots[idx] = Some(result);
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(ResolveError::unavailable("import worker exited early"))))
            .collect()
    }
}
