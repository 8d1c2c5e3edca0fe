//! Reference data for elections: colleges (scopes), parties, government
//! positions (offices), and recognised candidates. The catalog is consumed
//! by the election core, never computed by it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type ScopeId = u32;
pub type PartyId = u32;
pub type OfficeId = u32;
pub type CandidateId = u32;

/// A college or similar sub-unit used to restrict which offices and
/// candidates a voter may choose from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub name: String,
    pub description: Option<String>,
}

/// An accredited political party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliticalParty {
    pub id: PartyId,
    pub name: String,
    /// Whether the party's accreditation has been renewed.
    pub is_renewed: bool,
}

/// An elected role. Central when `scope` is `None`, otherwise restricted to
/// voters who declare the matching scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub name: String,
    pub description: Option<String>,
    pub scope: Option<ScopeId>,
    /// Nominal number of seats, used as the default when a season offers
    /// this office without overriding it.
    pub to_fill: u16,
}

/// A recognised candidate after their certificate of candidacy has been
/// processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub scope: ScopeId,
    pub party: Option<PartyId>,
    pub contact: Option<String>,
}

impl Candidate {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The full set of reference data, keyed by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub scopes: BTreeMap<ScopeId, Scope>,
    pub parties: BTreeMap<PartyId, PoliticalParty>,
    pub offices: BTreeMap<OfficeId, Office>,
    pub candidates: BTreeMap<CandidateId, Candidate>,
}

impl Catalog {
    /// The display label for an office, qualified by its scope.
    /// Central offices are labelled `CENTRAL`.
    pub fn office_label(&self, office: &Office) -> String {
        let scope_name = office
            .scope
            .and_then(|id| self.scopes.get(&id))
            .map(|scope| scope.name.as_str())
            .unwrap_or("CENTRAL");
        format!("{} - {}", scope_name, office.name)
    }

    pub fn party_name(&self, party: Option<PartyId>) -> Option<String> {
        party
            .and_then(|id| self.parties.get(&id))
            .map(|party| party.name.clone())
    }

    /// Look up an office by name and scope name, as used by season setup
    /// specs. Office names may repeat across scopes.
    pub fn office_by_name(&self, name: &str, scope: Option<&str>) -> Option<&Office> {
        self.offices.values().find(|office| {
            let scope_name = office
                .scope
                .and_then(|id| self.scopes.get(&id))
                .map(|scope| scope.name.as_str());
            office.name == name && scope_name == scope
        })
    }

    pub fn candidate_by_student_number(&self, student_number: &str) -> Option<&Candidate> {
        self.candidates
            .values()
            .find(|candidate| candidate.student_number == student_number)
    }
}
