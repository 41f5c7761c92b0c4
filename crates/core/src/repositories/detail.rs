//! Read views that aggregate several kinds of note: the patient detail page, the filtered
//! patient lists and the upcoming appointments list.

use super::notes::NotesService;
use super::patients::PatientService;
use crate::error::{OslerError, OslerResult};
use crate::records::{
    Appointment, Demographics, Document, Patient, PatientContact, Referral, ReferralStatus,
    VaccineFollowup,
};
use crate::todo::{TodoKind, TodoLists, TodoSection};
use chrono::NaiveDate;
use osler_uuid::ShardableUuid;
use serde::Serialize;
use std::cmp::Reverse;
use std::str::FromStr;

/// Appointments on one clinic date.
#[derive(Clone, Debug, Serialize)]
pub struct AppointmentDay {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AppointmentSection {
    pub title: &'static str,
    pub appointments: Vec<Appointment>,
    pub by_date: Vec<AppointmentDay>,
}

/// Everything shown on a patient's detail page.
#[derive(Clone, Debug, Serialize)]
pub struct PatientDetail {
    pub patient: Patient,
    pub demographics: Option<Demographics>,
    pub todo_sections: Vec<TodoSection>,
    pub total_ais: usize,
    /// Referrals with at least one follow-up request.
    pub referrals: Vec<Referral>,
    pub referral_status: String,
    pub referral_followups: Vec<PatientContact>,
    pub vaccine_followups: Vec<VaccineFollowup>,
    pub total_followups: usize,
    /// Future then past appointments.
    pub appointments: Vec<AppointmentSection>,
    /// Future appointments grouped by date.
    pub appointments_by_date: Vec<AppointmentDay>,
    pub documents: Vec<Document>,
}

/// Filters for the patient list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatientFilter {
    All,
    /// Patients who still need a workup.
    Active,
    /// Patients with a todo item that is due.
    AiActive,
    /// Patients with a todo item due in the future.
    AiInactive,
    /// Patients with a due priority action item.
    AiPriority,
    /// Patients the current provider is case manager for.
    UserCases,
}

impl FromStr for PatientFilter {
    type Err = OslerError;

    fn from_str(s: &str) -> OslerResult<Self> {
        match s {
            "" | "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "ai_active" => Ok(Self::AiActive),
            "ai_inactive" => Ok(Self::AiInactive),
            "ai_priority" => Ok(Self::AiPriority),
            "user_cases" => Ok(Self::UserCases),
            other => Err(OslerError::InvalidInput(format!(
                "unknown patient filter: {other}"
            ))),
        }
    }
}

/// Aggregate status of a patient's FQHC referrals.
///
/// `referrals` must be ordered by written time. No FQHC referrals gives
/// "No referrals currently"; all successful gives "Successful"; otherwise the status of the
/// most recent one.
pub fn aggregate_referral_status(referrals: &[Referral]) -> String {
    let fqhc: Vec<&Referral> = referrals.iter().filter(|r| r.kind.is_fqhc).collect();
    match fqhc.last() {
        None => "No referrals currently".to_string(),
        Some(_) if fqhc.iter().all(|r| r.status == ReferralStatus::Successful) => {
            ReferralStatus::Successful.label().to_string()
        }
        Some(last) => last.status.label().to_string(),
    }
}

/// Group appointments by date, keeping their order.
pub fn group_by_date(appointments: &[Appointment]) -> Vec<AppointmentDay> {
    let mut days: Vec<AppointmentDay> = Vec::new();
    for appointment in appointments {
        match days.last_mut() {
            Some(day) if day.date == appointment.clindate => {
                day.appointments.push(appointment.clone())
            }
            _ => days.push(AppointmentDay {
                date: appointment.clindate,
                appointments: vec![appointment.clone()],
            }),
        }
    }
    days
}

/// Split appointments into future (on or after `today`, ascending by date then time) and past
/// (descending by date, ascending by time).
pub fn split_appointments(
    mut appointments: Vec<Appointment>,
    today: NaiveDate,
) -> (Vec<Appointment>, Vec<Appointment>) {
    appointments.sort_by_key(|a| (a.clindate, a.clintime));
    let (future, mut past): (Vec<_>, Vec<_>) =
        appointments.into_iter().partition(|a| a.clindate >= today);
    past.sort_by_key(|a| (Reverse(a.clindate), a.clintime));
    (future, past)
}

#[derive(Clone, Debug)]
pub struct DetailService {
    patients: PatientService,
    notes: NotesService,
}

impl DetailService {
    pub fn new(patients: PatientService, notes: NotesService) -> Self {
        Self { patients, notes }
    }

    /// Items from every enabled todo-list manager, classified against `today`.
    pub fn todo_lists(&self, patient: &ShardableUuid, today: NaiveDate) -> OslerResult<TodoLists> {
        let mut lists = TodoLists::default();
        for kind in self.patients.storage().cfg().todo_list_managers() {
            match kind {
                TodoKind::ActionItem => lists.extend(&self.notes.action_items(patient)?, today),
                TodoKind::FollowupRequest => {
                    lists.extend(&self.notes.followup_requests(patient)?, today)
                }
                TodoKind::VaccineActionItem => {
                    lists.extend(&self.notes.vaccine_action_items(patient)?, today)
                }
            }
        }
        lists.sort();
        Ok(lists)
    }

    pub fn patient_detail(
        &self,
        patient_id: &ShardableUuid,
        today: NaiveDate,
    ) -> OslerResult<PatientDetail> {
        let patient = self.patients.get(patient_id)?;
        let demographics = self.patients.find_demographics(patient_id)?;

        let todo = self.todo_lists(patient_id, today)?;
        let total_ais = todo.total();

        let mut referrals = self.notes.referrals(patient_id)?;
        referrals.sort_by_key(|r| r.meta.written_datetime);
        let referral_status = aggregate_referral_status(&referrals);
        let requests = self.notes.followup_requests(patient_id)?;
        referrals.retain(|r| requests.iter().any(|f| f.referral == r.meta.id));

        let mut referral_followups = self.notes.patient_contacts(patient_id)?;
        referral_followups.sort_by_key(|c| Reverse(c.meta.written_datetime));
        let mut vaccine_followups = self.notes.vaccine_followups(patient_id)?;
        vaccine_followups.sort_by_key(|v| Reverse(v.meta.written_datetime));
        let action_item_followups = self.notes.action_item_followups(patient_id)?.len();
        let total_followups =
            referral_followups.len() + action_item_followups + vaccine_followups.len();

        let (future, past) = split_appointments(self.notes.appointments(patient_id)?, today);
        let future_by_date = group_by_date(&future);
        let past_by_date = group_by_date(&past);

        let mut documents = self.notes.documents(patient_id)?;
        documents.sort_by_key(|d| Reverse(d.meta.written_datetime));

        Ok(PatientDetail {
            patient,
            demographics,
            todo_sections: todo.into_sections(),
            total_ais,
            referrals,
            referral_status,
            referral_followups,
            vaccine_followups,
            total_followups,
            appointments: vec![
                AppointmentSection {
                    title: "Future Appointments",
                    appointments: future,
                    by_date: future_by_date.clone(),
                },
                AppointmentSection {
                    title: "Past Appointments",
                    appointments: past,
                    by_date: past_by_date,
                },
            ],
            appointments_by_date: future_by_date,
            documents,
        })
    }

    /// Patients matching `filter`, ordered by last name.
    ///
    /// `provider` is the current user's provider, used by [`PatientFilter::UserCases`].
    pub fn list_patients(
        &self,
        filter: PatientFilter,
        provider: Option<&ShardableUuid>,
        today: NaiveDate,
    ) -> OslerResult<Vec<Patient>> {
        let patients = self.patients.list();
        let mut out = Vec::new();
        for patient in patients {
            let keep = match filter {
                PatientFilter::All => true,
                PatientFilter::Active => patient.needs_workup,
                PatientFilter::UserCases => {
                    provider.is_some_and(|p| patient.case_managers.contains(p))
                }
                PatientFilter::AiActive => !self.todo_lists(&patient.id, today)?.active.is_empty(),
                PatientFilter::AiInactive => {
                    !self.todo_lists(&patient.id, today)?.pending.is_empty()
                }
                PatientFilter::AiPriority => self.todo_lists(&patient.id, today)?.has_active_priority(),
            };
            if keep {
                out.push(patient);
            }
        }
        Ok(out)
    }

    /// Every patient's appointments from `today` onwards, grouped by date.
    pub fn upcoming_appointments(&self, today: NaiveDate) -> OslerResult<Vec<AppointmentDay>> {
        let mut upcoming = Vec::new();
        for patient in self.patients.list() {
            upcoming.extend(
                self.notes
                    .appointments(&patient.id)?
                    .into_iter()
                    .filter(|a| a.clindate >= today),
            );
        }
        upcoming.sort_by_key(|a| (a.clindate, a.clintime));
        Ok(group_by_date(&upcoming))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FollowupRequestInput, NoteMeta, ReferralKind, VaccineActionItemInput};
    use crate::repositories::notes::tests::{
        acting, action_item_input, appointment_input, contact_input, date, referral_input, setup,
    };
    use crate::repositories::patients::tests::{patient_input, test_author};
    use crate::todo::TodoLink;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn referral(status: ReferralStatus, is_fqhc: bool, minute: u32) -> Referral {
        Referral {
            meta: NoteMeta {
                id: ShardableUuid::new(),
                patient: ShardableUuid::new(),
                author: ShardableUuid::new(),
                author_type: ShardableUuid::new(),
                written_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap(),
            },
            kind: ReferralKind {
                name: "FQHC".into(),
                is_fqhc,
            },
            locations: vec![],
            comments: String::new(),
            status,
        }
    }

    #[test]
    fn referral_status_aggregation() {
        use ReferralStatus::*;

        assert_eq!(aggregate_referral_status(&[]), "No referrals currently");
        assert_eq!(
            aggregate_referral_status(&[referral(Pending, false, 0)]),
            "No referrals currently"
        );
        assert_eq!(
            aggregate_referral_status(&[referral(Successful, true, 0), referral(Successful, true, 1)]),
            "Successful"
        );
        assert_eq!(
            aggregate_referral_status(&[referral(Successful, true, 0), referral(Pending, true, 1)]),
            "Pending"
        );
        assert_eq!(
            aggregate_referral_status(&[
                referral(Pending, true, 0),
                referral(Unsuccessful, true, 1),
                referral(Successful, false, 2),
            ]),
            "Unsuccessful"
        );
    }

    #[test]
    fn parses_filters() {
        assert_eq!("".parse::<PatientFilter>().unwrap(), PatientFilter::All);
        assert_eq!(
            "ai_priority".parse::<PatientFilter>().unwrap(),
            PatientFilter::AiPriority
        );
        assert!("unsigned_workup".parse::<PatientFilter>().is_err());
    }

    #[test]
    fn detail_aggregates_todos_referrals_and_appointments() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let (patients, notes, patient) = setup(&temp);
        let detail = DetailService::new(patients.clone(), notes.clone());
        let acting = acting();
        let today = date(4, 10);

        // Todo items: two active (one priority), one pending, one completed.
        notes
            .create_action_item(&acting, &patient, action_item_input(date(4, 1), false))
            .unwrap();
        let priority = notes
            .create_action_item(&acting, &patient, action_item_input(date(4, 9), true))
            .unwrap();
        notes
            .create_action_item(&acting, &patient, action_item_input(date(5, 1), false))
            .unwrap();
        let done = notes
            .create_action_item(&acting, &patient, action_item_input(date(3, 1), false))
            .unwrap();
        notes
            .mark_action_item_done(&acting, &patient, &done.meta.id)
            .unwrap();
        notes
            .create_vaccine_action_item(
                &acting,
                &patient,
                VaccineActionItemInput {
                    vaccine: "Tdap".into(),
                    due_date: date(6, 1),
                    comments: String::new(),
                },
            )
            .unwrap();

        // One referral with its request, contacted once.
        let (referral, request) = notes
            .create_referral(
                &acting,
                &patient,
                referral_input(true),
                FollowupRequestInput {
                    due_date: date(4, 20),
                    contact_instructions: "Check in".into(),
                },
            )
            .unwrap();
        notes
            .create_patient_contact(
                &acting,
                &patient,
                &referral.meta.id,
                &request.meta.id,
                contact_input(Some(false)),
            )
            .unwrap();

        // Appointments: two future on the same day, two past on different days.
        for (d, h) in [(date(4, 17), 10), (date(4, 17), 9), (date(4, 3), 11), (date(3, 27), 8)] {
            notes
                .create_appointment(&acting, &patient, appointment_input(d, h))
                .unwrap();
        }

        let view = detail.patient_detail(&patient, today).unwrap();

        let titles: Vec<_> = view.todo_sections.iter().map(|s| s.title).collect();
        assert_eq!(
            titles,
            vec!["Active Action Items", "Pending Action Items", "Completed Action Items"]
        );
        assert_eq!(view.todo_sections[0].items.len(), 2);
        assert_eq!(view.todo_sections[0].items[0].id, priority.meta.id);
        assert_eq!(view.todo_sections[0].link, TodoLink::Done);
        // pending: action item due 5/1, vaccine due 6/1
        assert_eq!(view.todo_sections[1].items.len(), 2);
        // completed: the done action item and the contacted followup request
        assert_eq!(view.todo_sections[2].items.len(), 2);
        assert_eq!(view.total_ais, 6);

        assert_eq!(view.referrals.len(), 1);
        assert_eq!(view.referral_status, "Unsuccessful");
        assert_eq!(view.referral_followups.len(), 1);
        assert_eq!(view.total_followups, 1);

        let future = &view.appointments[0];
        assert_eq!(future.title, "Future Appointments");
        let times: Vec<_> = future
            .appointments
            .iter()
            .map(|a| a.clintime.format("%H").to_string())
            .collect();
        assert_eq!(times, vec!["09", "10"]);
        assert_eq!(future.by_date.len(), 1);
        assert_eq!(view.appointments_by_date.len(), 1);
        assert_eq!(view.appointments_by_date[0].appointments.len(), 2);

        let past = &view.appointments[1];
        let past_dates: Vec<_> = past.appointments.iter().map(|a| a.clindate).collect();
        assert_eq!(past_dates, vec![date(4, 3), date(3, 27)]);
        assert_eq!(past.by_date.len(), 2);
    }

    #[test]
    fn detail_respects_enabled_todo_managers() {
        use crate::config::CoreConfig;
        use crate::repositories::shared::Storage;
        use crate::todo::TodoKind;
        use osler_types::NonEmptyText;
        use std::sync::Arc;

        let temp = TempDir::new().expect("Failed to create temp dir");
        let cfg = CoreConfig::new(
            temp.path().to_path_buf(),
            NonEmptyText::new("Test Clinic").unwrap(),
            None,
            vec![TodoKind::VaccineActionItem],
        )
        .unwrap();
        let patients = PatientService::new(Storage::new(Arc::new(cfg)).unwrap());
        let notes = NotesService::new(patients.clone());
        let detail = DetailService::new(patients.clone(), notes.clone());
        let patient = patients
            .create(&test_author(), patient_input("Ada", "Lovelace"))
            .unwrap()
            .id;

        notes
            .create_action_item(&acting(), &patient, action_item_input(date(4, 1), false))
            .unwrap();
        assert_eq!(detail.patient_detail(&patient, date(4, 10)).unwrap().total_ais, 0);
    }

    #[test]
    fn list_filters() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let (patients, notes, ada) = setup(&temp);
        let detail = DetailService::new(patients.clone(), notes.clone());
        let acting = acting();
        let today = date(4, 10);

        let mut input = patient_input("Grace", "Hopper");
        input.case_managers = vec![acting.provider];
        let grace = patients.create(&test_author(), input).unwrap().id;
        let alan = patients
            .create(&test_author(), patient_input("Alan", "Turing"))
            .unwrap()
            .id;
        patients.toggle_active(&test_author(), &alan).unwrap();

        notes
            .create_action_item(&acting, &ada, action_item_input(date(4, 1), true))
            .unwrap();
        notes
            .create_action_item(&acting, &grace, action_item_input(date(4, 1), false))
            .unwrap();
        notes
            .create_action_item(&acting, &alan, action_item_input(date(5, 1), false))
            .unwrap();

        let ids = |filter| -> Vec<ShardableUuid> {
            detail
                .list_patients(filter, Some(&acting.provider), today)
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect()
        };

        assert_eq!(ids(PatientFilter::All).len(), 3);
        assert_eq!(ids(PatientFilter::Active), vec![grace, ada]);
        assert_eq!(ids(PatientFilter::AiActive), vec![grace, ada]);
        assert_eq!(ids(PatientFilter::AiInactive), vec![alan]);
        assert_eq!(ids(PatientFilter::AiPriority), vec![ada]);
        assert_eq!(ids(PatientFilter::UserCases), vec![grace]);
    }

    #[test]
    fn upcoming_appointments_span_patients() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let (patients, notes, ada) = setup(&temp);
        let detail = DetailService::new(patients.clone(), notes.clone());
        let acting = acting();
        let grace = patients
            .create(&test_author(), patient_input("Grace", "Hopper"))
            .unwrap()
            .id;

        notes
            .create_appointment(&acting, &ada, appointment_input(date(4, 17), 10))
            .unwrap();
        notes
            .create_appointment(&acting, &grace, appointment_input(date(4, 17), 9))
            .unwrap();
        notes
            .create_appointment(&acting, &grace, appointment_input(date(4, 24), 9))
            .unwrap();
        notes
            .create_appointment(&acting, &ada, appointment_input(date(4, 3), 9))
            .unwrap();

        let days = detail.upcoming_appointments(date(4, 10)).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(4, 17));
        assert_eq!(days[0].appointments[0].meta.patient, grace);
        assert_eq!(days[1].appointments.len(), 1);
    }
}
