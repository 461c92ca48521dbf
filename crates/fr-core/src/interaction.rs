//! Registry of cross-section interaction labels.

/// Label meaning "no cross section applied" (a constant weight of 1).
pub const NO_XSEC: &str = "NoXSec";

/// Interaction types available in the GENIE cross-section splines.
pub const GENIE_INTERACTIONS: &[&str] = &[
    "qel_nc_p",
    "res_cc_p_1232P33",
    "res_cc_p_1620S31",
    "res_cc_p_1700D33",
    "res_cc_p_1910P31",
    "res_cc_p_1920P33",
    "res_cc_p_1905F35",
    "res_cc_p_1950F37",
    "res_nc_p_1232P33",
    "res_nc_p_1535S11",
    "res_nc_p_1520D13",
    "res_nc_p_1650S11",
    "res_nc_p_1700D13",
    "res_nc_p_1675D15",
    "res_nc_p_1620S31",
    "res_nc_p_1700D33",
    "res_nc_p_1440P11",
    "res_nc_p_1720P13",
    "res_nc_p_1680F15",
    "res_nc_p_1910P31",
    "res_nc_p_1920P33",
    "res_nc_p_1905F35",
    "res_nc_p_1950F37",
    "res_nc_p_1710P11",
    "dis_cc_p_ubarsea",
    "dis_cc_p_dval",
    "dis_cc_p_dsea",
    "dis_cc_p_ssea",
    "dis_nc_p_sbarsea",
    "dis_nc_p_ubarsea",
    "dis_nc_p_dbarsea",
    "dis_nc_p_dval",
    "dis_nc_p_dsea",
    "dis_nc_p_uval",
    "dis_nc_p_usea",
    "dis_nc_p_ssea",
    "dis_cc_p_dval_charm",
    "dis_cc_p_dsea_charm",
    "dis_cc_p_ssea_charm",
    "qel_cc_p_charm4222",
    "imd_cc",
    "ve_nc",
    "res_cc_p",
    "res_cc_n",
    "res_nc_p",
    "res_nc_n",
    "dis_cc_p",
    "dis_cc_n",
    "dis_nc_p",
    "dis_nc_n",
    "dis_cc_p_charm",
    "dis_cc_n_charm",
    "dis_nc_p_charm",
    "dis_nc_n_charm",
    "mec_cc",
    "mec_nc",
    "tot_cc",
    "tot_cc_p",
    "tot_cc_n",
    "tot_nc",
    "tot_nc_p",
    "tot_nc_n",
];

/// Source of valid interaction labels.
pub trait InteractionRegistry {
    /// Whether `label` names a known interaction type.
    fn is_valid(&self, label: &str) -> bool;

    /// All known labels, for error messages.
    fn labels(&self) -> Vec<&str>;
}

/// The built-in GENIE label list.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenieInteractions;

impl InteractionRegistry for GenieInteractions {
    fn is_valid(&self, label: &str) -> bool {
        GENIE_INTERACTIONS.contains(&label)
    }

    fn labels(&self) -> Vec<&str> {
        GENIE_INTERACTIONS.to_vec()
    }
}

/// A registry backed by an explicit list, e.g. the labels present in a cross-section table.
#[derive(Debug, Clone, Default)]
pub struct LabelList(pub Vec<String>);

impl InteractionRegistry for LabelList {
    fn is_valid(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    fn labels(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }
}
