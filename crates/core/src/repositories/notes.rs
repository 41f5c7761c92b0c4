//! Notes written about a patient: action items, appointments, referrals, vaccine records and
//! documents.
//!
//! Every operation is attributed to an [`ActingProvider`] and commits to the patient's
//! repository. Missing patients and missing notes are `NotFound`.

use super::patients::PatientService;
use crate::author::ActingProvider;
use crate::error::{OslerError, OslerResult};
use crate::records::{
    ActionItem, ActionItemFollowup, ActionItemFollowupInput, ActionItemInput, Appointment,
    AppointmentInput, Document, DocumentInput, FollowupRequest, FollowupRequestInput, NoteMeta,
    PatientContact, PatientContactInput, Referral, ReferralInput, ReferralStatus,
    VaccineActionItem, VaccineActionItemInput, VaccineFollowup, VaccineFollowupInput,
};
use crate::versioned_files::{CommitAction, RecordDomain};
use chrono::{DateTime, Utc};
use osler_files::FilesService;
use osler_types::NonEmptyText;
use osler_uuid::ShardableUuid;

#[derive(Clone, Debug)]
pub struct NotesService {
    patients: PatientService,
}

impl NotesService {
    pub fn new(patients: PatientService) -> Self {
        Self { patients }
    }

    fn new_meta(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        now: DateTime<Utc>,
    ) -> OslerResult<NoteMeta> {
        self.patients.existing_patient_dir(patient)?;
        Ok(NoteMeta {
            id: ShardableUuid::new(),
            patient: *patient,
            author: acting.provider,
            author_type: acting.provider_type,
            written_datetime: now,
        })
    }

    // ------------------------------------------------------------------------
    // Action items
    // ------------------------------------------------------------------------

    pub fn create_action_item(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        input: ActionItemInput,
    ) -> OslerResult<ActionItem> {
        let instruction = required(&input.instruction, "instruction")?;
        let _guard = self.patients.storage().lock();
        let now = Utc::now();
        let item = ActionItem {
            meta: self.new_meta(acting, patient, now)?,
            last_modified: now,
            due_date: input.due_date,
            instruction,
            comments: input.comments,
            priority: input.priority,
            completion_date: None,
            completion_author: None,
        };
        self.patients
            .save_record(&acting.author, &item, CommitAction::Create, "Action item created")?;
        Ok(item)
    }

    pub fn update_action_item(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
        input: ActionItemInput,
    ) -> OslerResult<ActionItem> {
        let instruction = required(&input.instruction, "instruction")?;
        let _guard = self.patients.storage().lock();
        let mut item: ActionItem = self.patients.load_record(patient, id)?;
        item.due_date = input.due_date;
        item.instruction = instruction;
        item.comments = input.comments;
        item.priority = input.priority;
        item.last_modified = Utc::now();
        self.patients
            .save_record(&acting.author, &item, CommitAction::Update, "Action item updated")?;
        Ok(item)
    }

    /// Mark an action item done by the acting provider.
    pub fn mark_action_item_done(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
    ) -> OslerResult<ActionItem> {
        let _guard = self.patients.storage().lock();
        let mut item: ActionItem = self.patients.load_record(patient, id)?;
        let now = Utc::now();
        item.completion_date = Some(now);
        item.completion_author = Some(acting.provider);
        item.last_modified = now;
        self.patients
            .save_record(&acting.author, &item, CommitAction::Update, "Action item completed")?;
        Ok(item)
    }

    /// Clear an action item's completion.
    pub fn reset_action_item(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
    ) -> OslerResult<ActionItem> {
        let _guard = self.patients.storage().lock();
        let mut item: ActionItem = self.patients.load_record(patient, id)?;
        item.completion_date = None;
        item.completion_author = None;
        item.last_modified = Utc::now();
        self.patients
            .save_record(&acting.author, &item, CommitAction::Update, "Action item reset")?;
        Ok(item)
    }

    pub fn action_items(&self, patient: &ShardableUuid) -> OslerResult<Vec<ActionItem>> {
        self.patients.list_records(patient)
    }

    pub fn action_item(&self, patient: &ShardableUuid, id: &ShardableUuid) -> OslerResult<ActionItem> {
        self.patients.load_record(patient, id)
    }

    pub fn create_action_item_followup(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        action_item: &ShardableUuid,
        input: ActionItemFollowupInput,
    ) -> OslerResult<ActionItemFollowup> {
        let _guard = self.patients.storage().lock();
        let item: ActionItem = self.patients.load_record(patient, action_item)?;
        if item.completion_date.is_none() {
            return Err(OslerError::InvalidInput(format!(
                "action item {action_item} is not done"
            )));
        }
        let followup = ActionItemFollowup {
            meta: self.new_meta(acting, patient, Utc::now())?,
            action_item: item.meta.id,
            contact_method: input.contact_method,
            contact_resolution: input.contact_resolution,
            comments: input.comments,
        };
        self.patients.save_record(
            &acting.author,
            &followup,
            CommitAction::Create,
            "Action item followup recorded",
        )?;
        Ok(followup)
    }

    pub fn action_item_followups(
        &self,
        patient: &ShardableUuid,
    ) -> OslerResult<Vec<ActionItemFollowup>> {
        self.patients.list_records(patient)
    }

    // ------------------------------------------------------------------------
    // Appointments
    // ------------------------------------------------------------------------

    pub fn create_appointment(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        input: AppointmentInput,
    ) -> OslerResult<Appointment> {
        let _guard = self.patients.storage().lock();
        let now = Utc::now();
        let appointment = Appointment {
            meta: self.new_meta(acting, patient, now)?,
            last_modified: now,
            clindate: input.clindate,
            clintime: input.clintime,
            appointment_type: input.appointment_type,
            comment: input.comment,
            pt_showed: None,
        };
        self.patients.save_record(
            &acting.author,
            &appointment,
            CommitAction::Create,
            "Appointment scheduled",
        )?;
        Ok(appointment)
    }

    pub fn update_appointment(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
        input: AppointmentInput,
    ) -> OslerResult<Appointment> {
        let _guard = self.patients.storage().lock();
        let mut appointment: Appointment = self.patients.load_record(patient, id)?;
        appointment.clindate = input.clindate;
        appointment.clintime = input.clintime;
        appointment.appointment_type = input.appointment_type;
        appointment.comment = input.comment;
        appointment.last_modified = Utc::now();
        self.patients.save_record(
            &acting.author,
            &appointment,
            CommitAction::Update,
            "Appointment updated",
        )?;
        Ok(appointment)
    }

    /// Record whether the patient arrived for an appointment.
    pub fn mark_appointment_showed(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
        showed: bool,
    ) -> OslerResult<Appointment> {
        let _guard = self.patients.storage().lock();
        let mut appointment: Appointment = self.patients.load_record(patient, id)?;
        appointment.pt_showed = Some(showed);
        appointment.last_modified = Utc::now();
        let summary = if showed {
            "Patient arrived for appointment"
        } else {
            "Patient did not show for appointment"
        };
        self.patients
            .save_record(&acting.author, &appointment, CommitAction::Update, summary)?;
        Ok(appointment)
    }

    pub fn appointments(&self, patient: &ShardableUuid) -> OslerResult<Vec<Appointment>> {
        self.patients.list_records(patient)
    }

    // ------------------------------------------------------------------------
    // Referrals
    // ------------------------------------------------------------------------

    /// Create a pending referral together with its first follow-up request, in one commit.
    pub fn create_referral(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        referral: ReferralInput,
        followup: FollowupRequestInput,
    ) -> OslerResult<(Referral, FollowupRequest)> {
        let _guard = self.patients.storage().lock();
        let now = Utc::now();
        let referral = Referral {
            meta: self.new_meta(acting, patient, now)?,
            kind: referral.kind,
            locations: referral.locations,
            comments: referral.comments,
            status: ReferralStatus::Pending,
        };
        let request = FollowupRequest {
            meta: self.new_meta(acting, patient, now)?,
            referral: referral.meta.id,
            due_date: followup.due_date,
            contact_instructions: followup.contact_instructions,
            completion_date: None,
            completion_author: None,
        };

        let writes = [
            self.patients.record_write(patient, &referral)?,
            self.patients.record_write(patient, &request)?,
        ];
        self.patients.commit_writes(
            &acting.author,
            patient,
            RecordDomain::Referral,
            CommitAction::Create,
            "Referral created",
            &writes,
        )?;
        Ok((referral, request))
    }

    /// Record an attempt to contact the patient about a referral.
    ///
    /// The follow-up request is marked done by the acting provider, and the referral's status
    /// follows the contact's outcome.
    pub fn create_patient_contact(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        referral: &ShardableUuid,
        followup_request: &ShardableUuid,
        input: PatientContactInput,
    ) -> OslerResult<PatientContact> {
        let _guard = self.patients.storage().lock();
        let mut referral: Referral = self.patients.load_record(patient, referral)?;
        let mut request: FollowupRequest = self.patients.load_record(patient, followup_request)?;
        if request.referral != referral.meta.id {
            return Err(OslerError::InvalidInput(format!(
                "followup request {} does not belong to referral {}",
                request.meta.id, referral.meta.id
            )));
        }

        let now = Utc::now();
        let contact = PatientContact {
            meta: self.new_meta(acting, patient, now)?,
            referral: referral.meta.id,
            followup_request: request.meta.id,
            contact_method: input.contact_method,
            patient_reached: input.patient_reached,
            has_appointment: input.has_appointment,
            appointment_location: input.appointment_location,
            pt_showed: input.pt_showed,
            no_apt_reason: input.no_apt_reason,
            no_show_reason: input.no_show_reason,
        };

        request.completion_date = Some(now);
        request.completion_author = Some(acting.provider);

        let mut writes = vec![
            self.patients.record_write(patient, &contact)?,
            self.patients.record_write(patient, &request)?,
        ];
        if let Some(status) = contact.resulting_referral_status() {
            referral.status = status;
            writes.push(self.patients.record_write(patient, &referral)?);
        }

        self.patients.commit_writes(
            &acting.author,
            patient,
            RecordDomain::Referral,
            CommitAction::Create,
            "Patient contact recorded",
            &writes,
        )?;
        Ok(contact)
    }

    pub fn referrals(&self, patient: &ShardableUuid) -> OslerResult<Vec<Referral>> {
        self.patients.list_records(patient)
    }

    pub fn followup_requests(&self, patient: &ShardableUuid) -> OslerResult<Vec<FollowupRequest>> {
        self.patients.list_records(patient)
    }

    pub fn patient_contacts(&self, patient: &ShardableUuid) -> OslerResult<Vec<PatientContact>> {
        self.patients.list_records(patient)
    }

    // ------------------------------------------------------------------------
    // Vaccines
    // ------------------------------------------------------------------------

    pub fn create_vaccine_followup(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        input: VaccineFollowupInput,
    ) -> OslerResult<VaccineFollowup> {
        if input.subsequent_dose && input.dose_date.is_none() {
            return Err(OslerError::InvalidInput(
                "dose_date is required when a subsequent dose is planned".into(),
            ));
        }
        let _guard = self.patients.storage().lock();
        let followup = VaccineFollowup {
            meta: self.new_meta(acting, patient, Utc::now())?,
            subsequent_dose: input.subsequent_dose,
            dose_date: input.dose_date,
            comments: input.comments,
        };
        self.patients.save_record(
            &acting.author,
            &followup,
            CommitAction::Create,
            "Vaccine followup recorded",
        )?;
        Ok(followup)
    }

    pub fn vaccine_followups(&self, patient: &ShardableUuid) -> OslerResult<Vec<VaccineFollowup>> {
        self.patients.list_records(patient)
    }

    pub fn create_vaccine_action_item(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        input: VaccineActionItemInput,
    ) -> OslerResult<VaccineActionItem> {
        let vaccine = required(&input.vaccine, "vaccine")?;
        let _guard = self.patients.storage().lock();
        let item = VaccineActionItem {
            meta: self.new_meta(acting, patient, Utc::now())?,
            vaccine,
            due_date: input.due_date,
            comments: input.comments,
            completion_date: None,
            completion_author: None,
        };
        self.patients.save_record(
            &acting.author,
            &item,
            CommitAction::Create,
            "Vaccine action item created",
        )?;
        Ok(item)
    }

    pub fn mark_vaccine_action_item_done(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
    ) -> OslerResult<VaccineActionItem> {
        let _guard = self.patients.storage().lock();
        let mut item: VaccineActionItem = self.patients.load_record(patient, id)?;
        item.completion_date = Some(Utc::now());
        item.completion_author = Some(acting.provider);
        self.patients.save_record(
            &acting.author,
            &item,
            CommitAction::Update,
            "Vaccine action item completed",
        )?;
        Ok(item)
    }

    pub fn vaccine_action_items(
        &self,
        patient: &ShardableUuid,
    ) -> OslerResult<Vec<VaccineActionItem>> {
        self.patients.list_records(patient)
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    /// Store an uploaded file in the patient's file store and record a document for it.
    pub fn create_document(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        input: DocumentInput,
        content: &[u8],
        filename: Option<&str>,
    ) -> OslerResult<Document> {
        let title = required(&input.title, "title")?;
        let _guard = self.patients.storage().lock();
        let dir = self.patients.existing_patient_dir(patient)?;
        let image = FilesService::new(&dir)?.add_bytes(content, filename)?;

        let now = Utc::now();
        let document = Document {
            meta: self.new_meta(acting, patient, now)?,
            last_modified: now,
            title,
            document_type: input.document_type,
            comments: input.comments,
            image,
        };
        self.patients
            .save_record(&acting.author, &document, CommitAction::Create, "Document uploaded")?;
        Ok(document)
    }

    pub fn update_document(
        &self,
        acting: &ActingProvider,
        patient: &ShardableUuid,
        id: &ShardableUuid,
        input: DocumentInput,
    ) -> OslerResult<Document> {
        let title = required(&input.title, "title")?;
        let _guard = self.patients.storage().lock();
        let mut document: Document = self.patients.load_record(patient, id)?;
        document.title = title;
        document.document_type = input.document_type;
        document.comments = input.comments;
        document.last_modified = Utc::now();
        self.patients
            .save_record(&acting.author, &document, CommitAction::Update, "Document updated")?;
        Ok(document)
    }

    pub fn document(&self, patient: &ShardableUuid, id: &ShardableUuid) -> OslerResult<Document> {
        self.patients.load_record(patient, id)
    }

    pub fn documents(&self, patient: &ShardableUuid) -> OslerResult<Vec<Document>> {
        self.patients.list_records(patient)
    }

    /// A document together with its stored bytes.
    pub fn document_file(
        &self,
        patient: &ShardableUuid,
        id: &ShardableUuid,
    ) -> OslerResult<(Document, Vec<u8>)> {
        let document = self.document(patient, id)?;
        let dir = self.patients.existing_patient_dir(patient)?;
        let bytes = FilesService::new(&dir)?.read(document.image.hash.as_str())?;
        Ok((document, bytes))
    }
}

fn required(value: &str, field: &str) -> OslerResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| OslerError::InvalidInput(format!("{field} is required")))
}
