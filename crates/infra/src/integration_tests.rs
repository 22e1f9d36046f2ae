//! Integration tests for the full projection pipeline.
//!
//! Tests: EventLog → EventBus → ProjectionWorker → ProjectionService → StateStore
//!
//! Verifies:
//! - Appended events reach the stored projection
//! - Redelivered messages never double count; messages ahead of their predecessors
//!   pull the missing events from the log instead of skipping them
//! - Partitioned workers keep subjects independent

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use chrono::{DateTime, Utc};
    use serde_json::json;

    use streakproj_core::SubjectId;
    use streakproj_events::{
        EVENT_POST_CREATED, EVENT_POST_EDITED, EventBus, InMemoryEventBus, SubjectEvent,
    };
    use streakproj_projector::{ProjectionState, Tz};

    use crate::config::ProjectorConfig;
    use crate::event_log::{EventLog, InMemoryEventLog, PublishingEventLog};
    use crate::service::ProjectionService;
    use crate::state_store::{InMemoryStateStore, StateStore};
    use crate::timezones::InMemoryTimezoneRegistry;
    use crate::workers::{ProjectionWorker, SubjectFilter};

    type Bus = Arc<InMemoryEventBus<SubjectEvent>>;
    type Log = Arc<PublishingEventLog<Arc<InMemoryEventLog>, Bus>>;
    type Service = ProjectionService<Log, Arc<InMemoryStateStore>, Arc<InMemoryTimezoneRegistry>>;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    struct Pipeline {
        bus: Bus,
        /// The log behind the publishing adapter; appends here are not published.
        unpublished: Arc<InMemoryEventLog>,
        service: Arc<Service>,
        store: Arc<InMemoryStateStore>,
        timezones: Arc<InMemoryTimezoneRegistry>,
    }

    fn setup() -> Pipeline {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let unpublished = Arc::new(InMemoryEventLog::new());
        let log: Log = Arc::new(PublishingEventLog::new(unpublished.clone(), bus.clone()));
        let store = Arc::new(InMemoryStateStore::new());
        let timezones = Arc::new(InMemoryTimezoneRegistry::new());
        let config = ProjectorConfig {
            default_timezone: Some(Tz::UTC),
            ..ProjectorConfig::default()
        };
        let service = Arc::new(ProjectionService::new(
            log,
            store.clone(),
            timezones.clone(),
            &config,
        ));
        Pipeline {
            bus,
            unpublished,
            service,
            store,
            timezones,
        }
    }

    /// Poll the store until `pred` holds or a deadline passes.
    fn wait_for(
        store: &InMemoryStateStore,
        subject: SubjectId,
        pred: impl Fn(&ProjectionState) -> bool,
    ) -> Option<ProjectionState> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(state) = store.load(subject).unwrap() {
                if pred(&state) {
                    return Some(state);
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        store.load(subject).unwrap()
    }

    #[test]
    fn appended_events_reach_the_projection() {
        let Pipeline {
            bus, service, store, ..
        } = setup();
        let subject = SubjectId::new();

        let worker_service = service.clone();
        let worker = ProjectionWorker::spawn("projector", &*bus, SubjectFilter::All, move |msg: SubjectEvent| {
            worker_service.handle(msg).map(|_| ())
        })
        .unwrap();

        for when in [
            "2024-01-01T08:00:00Z",
            "2024-01-01T12:00:00Z",
            "2024-01-02T07:00:00Z",
        ] {
            service
                .log()
                .append(subject, EVENT_POST_CREATED, at(when), json!({ "body": "hi" }))
                .unwrap();
        }

        let state = wait_for(&store, subject, |s| s.applied_seq == 3).unwrap();
        worker.shutdown();

        assert_eq!(state.last_contribution_date.unwrap().to_string(), "2024-01-02");
        assert_eq!(state.current_day_post_count, 1);
    }

    #[test]
    fn out_of_order_and_redelivered_messages_converge() {
        let Pipeline {
            bus,
            unpublished,
            service,
            store,
            ..
        } = setup();
        let subject = SubjectId::new();

        let worker_service = service.clone();
        let worker = ProjectionWorker::spawn("projector", &*bus, SubjectFilter::All, move |msg: SubjectEvent| {
            worker_service.handle(msg).map(|_| ())
        })
        .unwrap();

        let appended: Vec<SubjectEvent> = [
            (EVENT_POST_CREATED, "2024-01-01T08:00:00Z"),
            (EVENT_POST_CREATED, "2024-01-01T09:00:00Z"),
            (EVENT_POST_EDITED, "2024-01-01T10:00:00Z"),
        ]
        .into_iter()
        .map(|(event_type, when)| unpublished.append(subject, event_type, at(when), json!({})).unwrap())
        .collect();

        // seq 2 lands first; its fold pulls the log suffix instead of skipping seq 1.
        // Everything delivered after that is stale or a duplicate.
        for index in [1, 0, 0, 2, 1] {
            bus.publish(appended[index].clone()).unwrap();
        }

        let state = wait_for(&store, subject, |s| s.applied_seq == 3).unwrap();
        worker.shutdown();

        assert_eq!(state.current_day_post_count, 2);
        assert_eq!(state.applied_seq, 3);
    }

    #[test]
    fn catch_up_recovers_what_the_bus_dropped() {
        let Pipeline { service, .. } = setup();
        let subject = SubjectId::new();

        // No worker subscribed: every publish is dropped.
        for when in ["2024-01-01T08:00:00Z", "2024-01-01T09:00:00Z"] {
            service
                .log()
                .append(subject, EVENT_POST_CREATED, at(when), json!({}))
                .unwrap();
        }
        assert_eq!(service.state(subject).unwrap(), None);

        let state = service.catch_up(subject).unwrap();
        assert_eq!(state.applied_seq, 2);
        assert_eq!(state.current_day_post_count, 2);
    }

    #[test]
    fn partitioned_workers_keep_subjects_independent() {
        let Pipeline {
            bus,
            service,
            store,
            timezones,
            ..
        } = setup();
        let subjects: Vec<SubjectId> = (0..6).map(|_| SubjectId::new()).collect();
        timezones.set(subjects[0], "Asia/Seoul").unwrap();

        let workers = ProjectionWorker::spawn_partitioned("projector", &*bus, 3, |_| {
            let s = service.clone();
            move |msg: SubjectEvent| s.handle(msg).map(|_| ())
        })
        .unwrap();

        for subject in &subjects {
            service
                .log()
                .append(*subject, EVENT_POST_CREATED, at("2024-01-01T20:00:00Z"), json!({}))
                .unwrap();
        }

        let states: Vec<ProjectionState> = subjects
            .iter()
            .map(|s| wait_for(&store, *s, |st| st.applied_seq == 1).unwrap())
            .collect();
        for w in workers {
            w.shutdown();
        }

        assert_eq!(states[0].last_contribution_date.unwrap().to_string(), "2024-01-02");
        for state in &states[1..] {
            assert_eq!(state.last_contribution_date.unwrap().to_string(), "2024-01-01");
            assert_eq!(state.current_day_post_count, 1);
        }
    }
}
