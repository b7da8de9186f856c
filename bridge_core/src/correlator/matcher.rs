use bridge_types::{ClassifiedRecord, CommandKind, CorrelatorResult, EventKind, EventRecord, SystemRecord};

/// Whether `record` resolves the pending command identified by `kind` +
/// `target` (spec.md §4.F per-kind matcher predicates).
pub fn resolves(kind: CommandKind, target: Option<&str>, record: &ClassifiedRecord) -> bool {
    match record {
        ClassifiedRecord::Event(e) => matches_event(kind, target, e),
        ClassifiedRecord::System(s) => matches_system(kind, target, s),
        _ => false,
    }
}

fn matches_event(kind: CommandKind, target: Option<&str>, e: &EventRecord) -> bool {
    let Some(event_kind) = e.kind else {
        return false;
    };
    let relevant = matches!(
        (kind, event_kind),
        (CommandKind::Invite, EventKind::Invite)
            | (CommandKind::Kick, EventKind::Kick)
            | (CommandKind::Promote, EventKind::Promote)
            | (CommandKind::Demote, EventKind::Demote)
            | (CommandKind::SetRank, EventKind::Promote)
            | (CommandKind::SetRank, EventKind::Demote)
    );
    relevant && target_matches(target, e.target.as_deref())
}

fn matches_system(kind: CommandKind, target: Option<&str>, s: &SystemRecord) -> bool {
    let success_kind = match kind {
        CommandKind::Mute => "mute_result",
        CommandKind::Unmute => "unmute_result",
        CommandKind::Blacklist => "blacklist_result",
        _ => "",
    };

    if s.system_kind == "command_error" {
        return payload_names_target(target, s.payload.as_deref());
    }
    if !success_kind.is_empty() && s.system_kind == success_kind {
        return payload_names_target(target, s.payload.as_deref());
    }
    false
}

fn target_matches(requested: Option<&str>, found: Option<&str>) -> bool {
    match (requested, found) {
        (Some(r), Some(f)) => r.eq_ignore_ascii_case(f),
        (None, _) => true,
        (Some(_), None) => false,
    }
}

fn payload_names_target(requested: Option<&str>, payload: Option<&str>) -> bool {
    match (requested, payload) {
        (Some(r), Some(p)) => p.to_lowercase().contains(&r.to_lowercase()),
        (None, _) => true,
        (Some(_), None) => false,
    }
}

/// Builds the [`CorrelatorResult`] a matched record resolves to: `System`
/// records of kind `command_error` are failures, everything else that
/// reached here is a success (spec.md §4.F).
pub fn build_result(record: &ClassifiedRecord) -> CorrelatorResult {
    match record {
        ClassifiedRecord::Event(e) => CorrelatorResult::success(e.raw.clone()),
        ClassifiedRecord::System(s) if s.system_kind == "command_error" => {
            CorrelatorResult::failure(s.payload.clone().unwrap_or_else(|| s.raw.clone()))
        }
        ClassifiedRecord::System(s) => CorrelatorResult::success(s.payload.clone().unwrap_or_else(|| s.raw.clone())),
        _ => CorrelatorResult::failure("unexpected record kind"),
    }
}
