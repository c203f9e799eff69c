//! Role nodes and the closed role catalog.

use super::employee::EmployeeId;
use super::unit::{UnitId, UnitKind};
use std::fmt;

/// Opaque handle to a role node within an [`super::OrgGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(pub(crate) u32);

impl RoleId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named position owned by exactly one unit.
///
/// Role names are unique within their owning unit, not globally. The
/// employee list is the role-side half of the bidirectional assignment
/// relation; [`super::OrgGraph::assign`] keeps both halves in step.
#[derive(Debug, Clone)]
pub struct RoleNode {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) unit: UnitId,
    pub(crate) employees: Vec<EmployeeId>,
}

impl RoleNode {
    /// Returns the role's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the role's description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the owning unit.
    #[must_use]
    pub const fn unit(&self) -> UnitId {
        self.unit
    }

    /// Returns the employees holding this role, in assignment order.
    #[must_use]
    pub fn employees(&self) -> &[EmployeeId] {
        &self.employees
    }
}

/// The closed catalog of recognized role names.
///
/// Every catalog entry is tagged with the unit kinds it may be attached to.
/// Names outside the catalog are tolerated on load (kept with a warning) but
/// are never valid for authoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // variant names restate the role names below
pub enum RoleType {
    Presidente,
    Vicepresidente,
    Segretario,
    Direttore,
    Consigliere,
    ResponsabileAmministrativo,
    ReferenteTecnico,
    ResponsabileCommerciale,
    ResponsabileRisorseUmane,
    ResponsabileLogistica,
    Analista,
    Consulente,
    DataProtectionOfficer,
    ChiefFinancialOfficer,
    ChiefTechnologyOfficer,
    HrSpecialist,
    QualityAssuranceManager,
    Coordinatore,
    TeamLeader,
    Tutor,
    Collaboratore,
    Membro,
    Stagista,
}

impl RoleType {
    /// Returns all catalog entries.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Presidente,
            Self::Vicepresidente,
            Self::Segretario,
            Self::Direttore,
            Self::Consigliere,
            Self::ResponsabileAmministrativo,
            Self::ReferenteTecnico,
            Self::ResponsabileCommerciale,
            Self::ResponsabileRisorseUmane,
            Self::ResponsabileLogistica,
            Self::Analista,
            Self::Consulente,
            Self::DataProtectionOfficer,
            Self::ChiefFinancialOfficer,
            Self::ChiefTechnologyOfficer,
            Self::HrSpecialist,
            Self::QualityAssuranceManager,
            Self::Coordinatore,
            Self::TeamLeader,
            Self::Tutor,
            Self::Collaboratore,
            Self::Membro,
            Self::Stagista,
        ]
    }

    /// Returns the role name as written in artifacts.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Presidente => "Presidente",
            Self::Vicepresidente => "Vicepresidente",
            Self::Segretario => "Segretario",
            Self::Direttore => "Direttore",
            Self::Consigliere => "Consigliere",
            Self::ResponsabileAmministrativo => "Responsabile Amministrativo",
            Self::ReferenteTecnico => "Referente Tecnico",
            Self::ResponsabileCommerciale => "Responsabile Commerciale",
            Self::ResponsabileRisorseUmane => "Responsabile Risorse Umane",
            Self::ResponsabileLogistica => "Responsabile Logistica",
            Self::Analista => "Analista",
            Self::Consulente => "Consulente",
            Self::DataProtectionOfficer => "Data Protection Officer",
            Self::ChiefFinancialOfficer => "Chief Financial Officer",
            Self::ChiefTechnologyOfficer => "Chief Technology Officer",
            Self::HrSpecialist => "HR Specialist",
            Self::QualityAssuranceManager => "Quality Assurance Manager",
            Self::Coordinatore => "Coordinatore",
            Self::TeamLeader => "Team Leader",
            Self::Tutor => "Tutor",
            Self::Collaboratore => "Collaboratore",
            Self::Membro => "Membro",
            Self::Stagista => "Stagista",
        }
    }

    /// Returns the unit kinds this role may be attached to.
    #[must_use]
    pub const fn valid_kinds(&self) -> &'static [UnitKind] {
        match self {
            Self::Presidente | Self::Vicepresidente | Self::Segretario => &[UnitKind::Board],
            Self::Direttore
            | Self::ResponsabileAmministrativo
            | Self::ReferenteTecnico
            | Self::ResponsabileCommerciale
            | Self::ResponsabileRisorseUmane
            | Self::ResponsabileLogistica
            | Self::Analista
            | Self::Consulente
            | Self::DataProtectionOfficer
            | Self::ChiefFinancialOfficer
            | Self::ChiefTechnologyOfficer
            | Self::HrSpecialist
            | Self::QualityAssuranceManager => &[UnitKind::Department],
            Self::Consigliere => &[UnitKind::Department, UnitKind::Group],
            Self::Coordinatore
            | Self::TeamLeader
            | Self::Tutor
            | Self::Collaboratore
            | Self::Membro
            | Self::Stagista => &[UnitKind::Group],
        }
    }

    /// Returns true if this role may be attached to the given unit kind.
    #[must_use]
    pub fn valid_for(&self, kind: UnitKind) -> bool {
        self.valid_kinds().contains(&kind)
    }

    /// Looks up a catalog entry by name (case-insensitive).
    #[must_use]
    pub fn find(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(name))
            .copied()
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(RoleType::find("direttore"), Some(RoleType::Direttore));
        assert_eq!(RoleType::find("PRESIDENTE"), Some(RoleType::Presidente));
        assert_eq!(
            RoleType::find("data protection officer"),
            Some(RoleType::DataProtectionOfficer)
        );
        assert_eq!(RoleType::find("Janitor"), None);
    }

    #[test]
    fn test_kind_compatibility() {
        assert!(RoleType::Presidente.valid_for(UnitKind::Board));
        assert!(!RoleType::Presidente.valid_for(UnitKind::Group));
        assert!(RoleType::Direttore.valid_for(UnitKind::Department));
        assert!(!RoleType::Direttore.valid_for(UnitKind::Group));
        assert!(RoleType::Membro.valid_for(UnitKind::Group));
        // Consigliere is the one role shared by departments and groups.
        assert!(RoleType::Consigliere.valid_for(UnitKind::Department));
        assert!(RoleType::Consigliere.valid_for(UnitKind::Group));
        assert!(!RoleType::Consigliere.valid_for(UnitKind::Board));
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for role in RoleType::all() {
            assert!(seen.insert(role.as_str().to_lowercase()));
        }
    }
}
