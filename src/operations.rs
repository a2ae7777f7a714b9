//! # Operations
//!
//! [`OnBase`] runs the request pipeline for every resource:
//!
//! ```text
//! get_connection ─► person_exists ─► procedure ─► drain ─► close
//!                                                            │
//!                               parse ◄─ classify ◄─ extract ┘
//! ```
//!
//! The session is closed before the outcome is inspected, so it is released on
//! every path, success or failure. A request dropped mid-exchange abandons its
//! session through [`SessionGuard`] instead.

use std::sync::Arc;

use serde_json::Value;

use crate::admission::{self, Admission, AdmissionPatch};
use crate::document::{self, DocumentRecord, DocumentRequest};
use crate::error_signal;
use crate::financial_aid::{self, FinancialAid, FinancialAidPatch};
use crate::holds::{self, Holds};
use crate::line_reader::LineReader;
use crate::record::LineFormats;
use crate::{
    Binds, ConnectionProvider, LineFormat, OnBaseError, OsuId, RecordParseError, ResourceKind,
    Session, SessionError, Statement,
};

/// The OnBase stored-procedure operations.
pub struct OnBase {
    provider: Arc<dyn ConnectionProvider>,
    formats: LineFormats,
    reader: LineReader,
}

impl OnBase {
    /// Operations over `provider` with the default line formats and fetch limit.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            formats: LineFormats::default(),
            reader: LineReader::default(),
        }
    }

    /// Replaces the line formats.
    pub fn with_formats(mut self, formats: LineFormats) -> Self {
        self.formats = formats;
        self
    }

    /// Replaces the line reader.
    pub fn with_reader(mut self, reader: LineReader) -> Self {
        self.reader = reader;
        self
    }

    /// The line format used for `kind`.
    pub fn format(&self, kind: ResourceKind) -> &LineFormat {
        self.formats.get(kind)
    }

    /// Admission applications of a person, optionally only `application_number`.
    pub async fn get_admission(
        &self,
        osu_id: &OsuId,
        application_number: Option<i64>,
    ) -> Result<Admission, OnBaseError> {
        self.run(
            ResourceKind::Admission,
            osu_id,
            Statement::GetApplications,
            Binds::new(),
            |lines, format| admission::parse(lines, format, application_number),
        )
        .await
    }

    /// Updates an application checklist and returns the person's admissions.
    pub async fn patch_admission(
        &self,
        osu_id: &OsuId,
        patch: &AdmissionPatch,
    ) -> Result<Admission, OnBaseError> {
        self.run(
            ResourceKind::Admission,
            osu_id,
            Statement::PatchApplications,
            patch.binds(),
            |lines, format| admission::parse(lines, format, None),
        )
        .await
    }

    /// Financial aid tracking requirements, optionally for one aid year.
    pub async fn get_financial_aid(
        &self,
        osu_id: &OsuId,
        financial_aid_year: Option<&str>,
    ) -> Result<FinancialAid, OnBaseError> {
        let mut binds = Binds::new();
        binds.insert(
            "financialAidYear".to_string(),
            financial_aid_year
                .map(|year| Value::String(year.to_string()))
                .unwrap_or(Value::Null),
        );
        self.run(
            ResourceKind::FinancialAid,
            osu_id,
            Statement::GetTrackingRequirements,
            binds,
            financial_aid::parse,
        )
        .await
    }

    /// Updates a tracking requirement and returns the person's requirements.
    pub async fn patch_financial_aid(
        &self,
        osu_id: &OsuId,
        patch: &FinancialAidPatch,
    ) -> Result<FinancialAid, OnBaseError> {
        self.run(
            ResourceKind::FinancialAid,
            osu_id,
            Statement::PatchTrackingRequirements,
            patch.binds(),
            financial_aid::parse,
        )
        .await
    }

    /// Holds of a person, optionally only those whose code is in `codes`.
    pub async fn get_holds(
        &self,
        osu_id: &OsuId,
        codes: Option<&[String]>,
    ) -> Result<Holds, OnBaseError> {
        self.run(
            ResourceKind::Holds,
            osu_id,
            Statement::GetHolds,
            Binds::new(),
            |lines, format| holds::parse(lines, format, codes),
        )
        .await
    }

    /// Indexes a document and returns the stored record.
    pub async fn post_document(
        &self,
        request: &DocumentRequest,
    ) -> Result<DocumentRecord, OnBaseError> {
        self.run(
            ResourceKind::Document,
            &request.osu_id,
            Statement::PostDocument,
            request.binds(),
            document::parse,
        )
        .await
    }

    async fn run<T, F>(
        &self,
        kind: ResourceKind,
        osu_id: &OsuId,
        statement: Statement,
        attributes: Binds,
        parse: F,
    ) -> Result<T, OnBaseError>
    where
        F: FnOnce(&[String], &LineFormat) -> Result<T, RecordParseError>,
    {
        let mut binds = Binds::new();
        binds.insert("osuId".to_string(), Value::String(osu_id.to_string()));
        binds.extend(attributes);

        let mut guard = SessionGuard::new(self.provider.get_connection().await?);
        let outcome = self
            .exchange(guard.session.as_mut(), osu_id, statement, &binds)
            .await;
        guard.close().await;
        let lines = match outcome {
            Ok(lines) => lines,
            Err(ExchangeError::Missing) => {
                tracing::warn!(osu_id = %osu_id, "person does not exist");
                return Err(OnBaseError::NotFound(format!(
                    "{} - No person exists",
                    osu_id
                )));
            }
            Err(ExchangeError::Session(err)) => {
                tracing::error!(
                    statement = statement.name(),
                    error = %err,
                    "session failure"
                );
                return Err(err.into());
            }
        };

        let format = self.formats.get(kind);
        error_signal::check(&lines, format)?;
        parse(&lines, format).map_err(|err| {
            tracing::error!(kind = ?kind, error = %err, "malformed procedure output");
            OnBaseError::Parse(err)
        })
    }

    async fn exchange(
        &self,
        session: &mut dyn Session,
        osu_id: &OsuId,
        statement: Statement,
        binds: &Binds,
    ) -> Result<Vec<String>, ExchangeError> {
        let mut lookup = Binds::new();
        lookup.insert("osuId".to_string(), Value::String(osu_id.to_string()));
        let existence = session.execute(Statement::PersonExists, &lookup).await?;
        if existence.rows.is_empty() {
            return Err(ExchangeError::Missing);
        }
        tracing::debug!(statement = statement.name(), "executing procedure");
        session.execute(statement, binds).await?;
        let lines = self.reader.drain(session).await?;
        tracing::debug!(
            statement = statement.name(),
            lines = lines.len(),
            "drained output"
        );
        Ok(lines)
    }
}

/// Owns a session for one request and abandons it if dropped before close.
struct SessionGuard {
    session: Box<dyn Session>,
    closed: bool,
}

impl SessionGuard {
    fn new(session: Box<dyn Session>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    async fn close(&mut self) {
        self.session.close().await;
        self.closed = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("request dropped before its session closed; abandoning session");
            self.session.abandon();
        }
    }
}

enum ExchangeError {
    Missing,
    Session(SessionError),
}

impl From<SessionError> for ExchangeError {
    fn from(err: SessionError) -> Self {
        ExchangeError::Session(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScriptedConnectionProvider, ScriptedSession};

    const OSU_ID: &str = "123456789";

    fn admission_line(checklist: &str, just_completed: &str, error: &str) -> String {
        format!(
            "{};201901;3;AD;01-FEB-2019;UG;C;N;AA;C;02-FEB-2019;03-FEB-2019;{};N;201901;N;{};Desc;04-FEB-2019;Y;1;{}",
            OSU_ID, just_completed, checklist, error
        )
    }

    fn fixture() -> (Arc<ScriptedConnectionProvider>, OnBase) {
        let provider = Arc::new(ScriptedConnectionProvider::new());
        let onbase = OnBase::new(provider.clone());
        (provider, onbase)
    }

    fn osu_id() -> OsuId {
        OsuId::new(OSU_ID).unwrap()
    }

    #[tokio::test]
    async fn single_fetch_builds_one_application() {
        let (provider, onbase) = fixture();
        let line = admission_line("TRAN", "Y", "");
        provider.push(ScriptedSession::for_person(&[&line]));
        let admission = onbase.get_admission(&osu_id(), None).await.unwrap();
        assert_eq!(admission.applications.len(), 1);
        assert!(admission.applications[0].just_completed_ind);
        assert_eq!(admission.applications[0].checklists.len(), 1);
        assert_eq!(provider.closes(), 1);
        assert_eq!(
            provider.executed(),
            vec![
                Statement::PersonExists,
                Statement::GetApplications,
                Statement::GetLine
            ]
        );
    }

    #[tokio::test]
    async fn shared_key_collects_checklists() {
        let (provider, onbase) = fixture();
        let lines = [
            admission_line("TRAN", "N", ""),
            admission_line("TEST", "N", ""),
            admission_line("ESSY", "N", ""),
        ];
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        provider.push(ScriptedSession::for_person(&lines));
        let admission = onbase.get_admission(&osu_id(), None).await.unwrap();
        assert_eq!(admission.applications.len(), 1);
        let codes: Vec<&str> = admission.applications[0]
            .checklists
            .iter()
            .map(|item| item.code.as_str())
            .collect();
        assert_eq!(codes, vec!["TRAN", "TEST", "ESSY"]);
    }

    #[tokio::test]
    async fn error_signal_is_not_found() {
        let (provider, onbase) = fixture();
        let line = admission_line("", "N", "123456789 - No person exists");
        provider.push(ScriptedSession::for_person(&[&line]));
        let err = onbase.get_admission(&osu_id(), None).await.unwrap_err();
        assert_eq!(
            err,
            OnBaseError::NotFound("123456789 - No person exists".to_string())
        );
        assert_eq!(provider.closes(), 1);
    }

    #[tokio::test]
    async fn missing_person_stops_after_lookup() {
        let (provider, onbase) = fixture();
        provider.push(ScriptedSession::for_missing_person());
        let err = onbase.get_holds(&osu_id(), None).await.unwrap_err();
        assert_eq!(
            err,
            OnBaseError::NotFound("123456789 - No person exists".to_string())
        );
        assert_eq!(provider.executed(), vec![Statement::PersonExists]);
        assert_eq!(provider.closes(), 1);
    }

    #[tokio::test]
    async fn patch_binds_person_and_attributes() {
        let (provider, onbase) = fixture();
        let line = admission_line("TRAN", "N", "");
        provider.push(ScriptedSession::for_person(&[&line]));
        let patch = AdmissionPatch {
            term_code: "201901".to_string(),
            application_number: 3,
            checklist_code: "TRAN".to_string(),
            checklist_receive_date: Some("04-FEB-2019".to_string()),
        };
        let admission = onbase.patch_admission(&osu_id(), &patch).await.unwrap();
        assert_eq!(admission.applications[0].checklists[0].code, "TRAN");
        let binds = provider.binds_for(Statement::PatchApplications).unwrap();
        assert_eq!(binds["osuId"], OSU_ID);
        assert_eq!(binds["termCode"], "201901");
        assert_eq!(binds["applicationNumber"], 3);
        assert_eq!(provider.closes(), 1);
    }

    #[tokio::test]
    async fn transport_failure_still_closes() {
        let (provider, onbase) = fixture();
        let mut session = ScriptedSession::for_person(&["unused"]);
        session.fail_after(2, SessionError::Database("connection reset".to_string()));
        provider.push(session);
        let err = onbase.get_financial_aid(&osu_id(), Some("1920")).await.unwrap_err();
        assert!(matches!(err, OnBaseError::Transport(SessionError::Database(_))));
        assert_eq!(provider.closes(), 1);
    }

    #[tokio::test]
    async fn cancelled_request_abandons_its_session() {
        let (provider, onbase) = fixture();
        let mut stalled =
            ScriptedSession::for_person(&["123456789;AR;Academic;;;;;;;;;;;;;REG;Y;"]);
        stalled.stall_after(2);
        provider.push(stalled);
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            onbase.get_holds(&osu_id(), None),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(provider.abandoned(), 1);
        assert_eq!(provider.closes(), 0);

        provider.push(ScriptedSession::for_person(&[
            "123456789;AD;Advising;;;;;;;;;;;;;ADV;Y;",
        ]));
        let holds = onbase.get_holds(&osu_id(), None).await.unwrap();
        assert_eq!(holds.holds.len(), 1);
        assert_eq!(provider.acquired(), 2);
        assert_eq!(provider.closes(), 1);
        assert_eq!(provider.abandoned(), 1);
    }

    #[tokio::test]
    async fn empty_provider_is_unavailable() {
        let (_provider, onbase) = fixture();
        let err = onbase.get_holds(&osu_id(), None).await.unwrap_err();
        assert!(matches!(err, OnBaseError::Transport(SessionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn parse_failure_is_reported_after_close() {
        let (provider, onbase) = fixture();
        provider.push(ScriptedSession::for_person(&["123456789;;3"]));
        let err = onbase.get_admission(&osu_id(), None).await.unwrap_err();
        assert!(matches!(
            err,
            OnBaseError::Parse(RecordParseError::MissingField { field: "termCode", .. })
        ));
        assert_eq!(provider.closes(), 1);
    }

    #[tokio::test]
    async fn financial_aid_year_is_bound() {
        let (provider, onbase) = fixture();
        provider.push(ScriptedSession::for_person(&["123456789;1920;VERIF;;;;;;;;;Y;Y;;"]));
        let aid = onbase.get_financial_aid(&osu_id(), Some("1920")).await.unwrap();
        assert_eq!(aid.tracking_requirements.len(), 1);
        let binds = provider.binds_for(Statement::GetTrackingRequirements).unwrap();
        assert_eq!(binds["financialAidYear"], "1920");
    }

    #[tokio::test]
    async fn custom_format_moves_the_error_field() {
        let provider = Arc::new(ScriptedConnectionProvider::new());
        let mut formats = LineFormats::default();
        formats.set(ResourceKind::Holds, LineFormat::new("|", 2));
        let onbase = OnBase::new(provider.clone()).with_formats(formats);
        provider.push(ScriptedSession::for_person(&["123456789|AR|bad code"]));
        let err = onbase.get_holds(&osu_id(), None).await.unwrap_err();
        assert_eq!(err, OnBaseError::BadRequest(vec!["bad code".to_string()]));
    }

    #[tokio::test]
    async fn duplicate_document_conflicts() {
        let (provider, onbase) = fixture();
        let line = "123456789;;;;;;;;;;;;;;;;Document already exists";
        provider.push(ScriptedSession::for_person(&[line]));
        let request: DocumentRequest = serde_json::from_value(serde_json::json!({
            "osuId": OSU_ID,
            "documentId": 7,
            "documentTypeName": "Transcript",
            "documentReceiveDate": "20-MAY-2019 13:45:00",
            "keywordName": "TERM",
            "keywordValue": "201901"
        }))
        .unwrap();
        let err = onbase.post_document(&request).await.unwrap_err();
        assert!(matches!(err, OnBaseError::Conflict(_)));
        assert_eq!(provider.closes(), 1);
    }
}
