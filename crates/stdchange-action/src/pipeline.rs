use chrono_tz::Tz;
use stdchange_core::change_request::{change_link, change_link_by_sys_id};
use stdchange_core::work_start::to_utc;
use stdchange_core::{ChangeRequestDraft, ChangeRequestResult, ExistingChange, PushEvent};
use stdchange_service::{ChangeService, HttpService, ServiceError};
use tracing::{debug, info, warn};

use crate::identity::lookup_assignee;
use crate::{ActionError, ChangeReport, Outcome, Settings};

/// The only trigger the action files changes for.
pub const SUPPORTED_EVENT: &str = "push";

/// Run the action against the real gateway.
pub async fn run(settings: &Settings) -> Outcome {
    let event = match prepare(settings) {
        Ok(event) => event,
        Err(e) => return e.into(),
    };
    let service = match HttpService::connect(&settings.gateway, &settings.credentials).await {
        Ok(service) => service,
        Err(e) => return ActionError::from(e).into(),
    };
    info!(
        "authenticated against the {} gateway",
        service.environment()
    );
    file_change(&service, settings, &event).await
}

/// Everything that can be checked before touching the network.
pub fn prepare(settings: &Settings) -> Result<PushEvent, ActionError> {
    check_trigger(&settings.event_name)?;
    load_event(settings)
}

pub fn check_trigger(event_name: &str) -> Result<(), ActionError> {
    if event_name == SUPPORTED_EVENT {
        Ok(())
    } else {
        Err(ActionError::UnsupportedTrigger(event_name.to_string()))
    }
}

fn load_event(settings: &Settings) -> Result<PushEvent, ActionError> {
    let path = &settings.event_path;
    let payload = std::fs::read_to_string(path)
        .map_err(|e| ActionError::InvalidPayload(format!("{}: {e}", path.display())))?;
    debug!("event payload: {payload}");
    PushEvent::from_json(&payload).map_err(|e| ActionError::InvalidPayload(e.to_string()))
}

/// File a change for `event`, or report the one an earlier attempt of this
/// workflow run already filed.
pub async fn file_change(
    service: &dyn ChangeService,
    settings: &Settings,
    event: &PushEvent,
) -> Outcome {
    let run_link = settings.run.run_link();
    let (assignee, existing) = tokio::join!(
        lookup_assignee(
            service,
            &event.pusher.name,
            settings.dependabot_fallback.as_deref()
        ),
        service.find_change_for_run(&run_link),
    );

    match existing {
        Ok(Some(existing)) => {
            info!("run {run_link} already has a change request, not filing another");
            return report_existing(service, existing, settings.backend_time_zone);
        }
        Ok(None) => {}
        Err(e) => return ActionError::from(e).into(),
    }

    let assignee = match assignee {
        Ok(assignee) => assignee,
        Err(e) => return e.into(),
    };
    let draft = ChangeRequestDraft::new(
        &assignee,
        settings.minutes_until_planned_end,
        &settings.template_id,
        event,
        &settings.run,
    );
    debug!("submitting change request: {}", draft.short_description);
    match service.create_change(&draft).await {
        Ok(created) => report_created(service, created, settings.backend_time_zone),
        Err(e) => ActionError::from(e).into(),
    }
}

fn report_created(service: &dyn ChangeService, created: ChangeRequestResult, zone: Tz) -> Outcome {
    let work_start = match to_utc(&created.work_start, zone) {
        Ok(utc) => utc,
        Err(e) => {
            return ActionError::Service(ServiceError::MalformedResponse(format!(
                "change {} has an unusable workStart: {e}",
                created.number
            )))
            .into()
        }
    };
    Outcome::Success(ChangeReport {
        link: change_link(service.itsm_url(), &created.number),
        number: Some(created.number),
        sys_id: created.sys_id,
        work_start: Some(work_start),
        environment: service.environment(),
        created: true,
    })
}

/// Warnings go out through redaction, and a sys_id has the shape of a legacy
/// token, so they name the change by number only.
fn report_existing(service: &dyn ChangeService, existing: ExistingChange, zone: Tz) -> Outcome {
    let mut warnings = Vec::new();
    let label = existing
        .number
        .as_deref()
        .map_or_else(|| "for this run".to_string(), |n| n.to_string());

    let link = match &existing.number {
        Some(number) => change_link(service.itsm_url(), number),
        None => {
            warnings.push(
                "existing change request has no number, linking by sys_id (link in the log)"
                    .to_string(),
            );
            change_link_by_sys_id(service.itsm_url(), &existing.sys_id)
        }
    };

    let work_start = match existing.work_start.as_deref().map(|local| to_utc(local, zone)) {
        Some(Ok(utc)) => Some(utc),
        Some(Err(e)) => {
            warnings.push(format!("could not convert work start: {e}"));
            None
        }
        None => {
            warnings.push(format!("existing change request {label} has no work start"));
            None
        }
    };

    for w in &warnings {
        warn!("{w}");
    }
    Outcome::with_warnings(
        ChangeReport {
            number: existing.number,
            sys_id: existing.sys_id,
            work_start,
            link,
            environment: service.environment(),
            created: false,
        },
        warnings,
    )
}
