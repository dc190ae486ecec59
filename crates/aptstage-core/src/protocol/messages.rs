//! Message identifiers
//!
//! The APT message set is closed and fixed by the controller firmware, so it is
//! modelled as a plain enum with a static name/code table. Identifiers come in
//! SET/REQ/GET triples per parameter plus a few asynchronous notifications.

use serde::{Deserialize, Serialize};

/// APT message identifiers used by the rotation stage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum MessageId {
    HwDisconnect = 0x0002,
    HwReqInfo = 0x0005,
    HwGetInfo = 0x0006,
    HwStartUpdateMsgs = 0x0011,
    HwStopUpdateMsgs = 0x0012,
    HwResponse = 0x0080,
    HwRichResponse = 0x0081,

    ModSetChanEnableState = 0x0210,
    ModReqChanEnableState = 0x0211,
    ModGetChanEnableState = 0x0212,
    ModIdentify = 0x0223,

    MotSetEncCounter = 0x0409,
    MotReqEncCounter = 0x040A,
    MotGetEncCounter = 0x040B,
    MotSetPosCounter = 0x0410,
    MotReqPosCounter = 0x0411,
    MotGetPosCounter = 0x0412,
    MotSetVelParams = 0x0413,
    MotReqVelParams = 0x0414,
    MotGetVelParams = 0x0415,
    MotSetJogParams = 0x0416,
    MotReqJogParams = 0x0417,
    MotGetJogParams = 0x0418,
    MotSetLimSwitchParams = 0x0423,
    MotReqLimSwitchParams = 0x0424,
    MotGetLimSwitchParams = 0x0425,
    MotSetPowerParams = 0x0426,
    MotReqPowerParams = 0x0427,
    MotGetPowerParams = 0x0428,
    MotReqAdcInputs = 0x042B,
    MotGetAdcInputs = 0x042C,
    MotSetGenMoveParams = 0x043A,
    MotReqGenMoveParams = 0x043B,
    MotGetGenMoveParams = 0x043C,
    MotSetHomeParams = 0x0440,
    MotReqHomeParams = 0x0441,
    MotGetHomeParams = 0x0442,
    MotMoveHome = 0x0443,
    MotMoveHomed = 0x0444,
    MotSetMoveRelParams = 0x0445,
    MotReqMoveRelParams = 0x0446,
    MotGetMoveRelParams = 0x0447,
    MotMoveRelative = 0x0448,
    MotSetMoveAbsParams = 0x0450,
    MotReqMoveAbsParams = 0x0451,
    MotGetMoveAbsParams = 0x0452,
    MotMoveAbsolute = 0x0453,
    MotMoveVelocity = 0x0457,
    MotMoveCompleted = 0x0464,
    MotMoveStop = 0x0465,
    MotMoveStopped = 0x0466,
    MotMoveJog = 0x046A,
    MotGetDcStatusUpdate = 0x0491,
    MotSetDcPidParams = 0x04A0,
    MotReqDcPidParams = 0x04A1,
    MotGetDcPidParams = 0x04A2,
    MotSetPotParams = 0x04B0,
    MotReqPotParams = 0x04B1,
    MotGetPotParams = 0x04B2,
    MotSetAvModes = 0x04B3,
    MotReqAvModes = 0x04B4,
    MotGetAvModes = 0x04B5,
    MotSetButtonParams = 0x04B6,
    MotReqButtonParams = 0x04B7,
    MotGetButtonParams = 0x04B8,
    MotSetEepromParams = 0x04B9,
    MotSetPositionLoopParams = 0x04D7,
    MotReqPositionLoopParams = 0x04D8,
    MotGetPositionLoopParams = 0x04D9,
    MotSetMotorOutputParams = 0x04DA,
    MotReqMotorOutputParams = 0x04DB,
    MotGetMotorOutputParams = 0x04DC,
    MotSetTrackSettleParams = 0x04E0,
    MotReqTrackSettleParams = 0x04E1,
    MotGetTrackSettleParams = 0x04E2,
    MotSetBowIndex = 0x04F4,
    MotReqBowIndex = 0x04F5,
    MotGetBowIndex = 0x04F6,
}

use MessageId::*;

/// Symbolic name and code of every known message, in code order.
pub static MESSAGE_TABLE: &[(&str, MessageId)] = &[
    ("MGMSG_HW_DISCONNECT", HwDisconnect),
    ("MGMSG_HW_REQ_INFO", HwReqInfo),
    ("MGMSG_HW_GET_INFO", HwGetInfo),
    ("MGMSG_HW_START_UPDATEMSGS", HwStartUpdateMsgs),
    ("MGMSG_HW_STOP_UPDATEMSGS", HwStopUpdateMsgs),
    ("MGMSG_HW_RESPONSE", HwResponse),
    ("MGMSG_HW_RICHRESPONSE", HwRichResponse),
    ("MGMSG_MOD_SET_CHANENABLESTATE", ModSetChanEnableState),
    ("MGMSG_MOD_REQ_CHANENABLESTATE", ModReqChanEnableState),
    ("MGMSG_MOD_GET_CHANENABLESTATE", ModGetChanEnableState),
    ("MGMSG_MOD_IDENTIFY", ModIdentify),
    ("MGMSG_MOT_SET_ENCCOUNTER", MotSetEncCounter),
    ("MGMSG_MOT_REQ_ENCCOUNTER", MotReqEncCounter),
    ("MGMSG_MOT_GET_ENCCOUNTER", MotGetEncCounter),
    ("MGMSG_MOT_SET_POSCOUNTER", MotSetPosCounter),
    ("MGMSG_MOT_REQ_POSCOUNTER", MotReqPosCounter),
    ("MGMSG_MOT_GET_POSCOUNTER", MotGetPosCounter),
    ("MGMSG_MOT_SET_VELPARAMS", MotSetVelParams),
    ("MGMSG_MOT_REQ_VELPARAMS", MotReqVelParams),
    ("MGMSG_MOT_GET_VELPARAMS", MotGetVelParams),
    ("MGMSG_MOT_SET_JOGPARAMS", MotSetJogParams),
    ("MGMSG_MOT_REQ_JOGPARAMS", MotReqJogParams),
    ("MGMSG_MOT_GET_JOGPARAMS", MotGetJogParams),
    ("MGMSG_MOT_SET_LIMSWITCHPARAMS", MotSetLimSwitchParams),
    ("MGMSG_MOT_REQ_LIMSWITCHPARAMS", MotReqLimSwitchParams),
    ("MGMSG_MOT_GET_LIMSWITCHPARAMS", MotGetLimSwitchParams),
    ("MGMSG_MOT_SET_POWERPARAMS", MotSetPowerParams),
    ("MGMSG_MOT_REQ_POWERPARAMS", MotReqPowerParams),
    ("MGMSG_MOT_GET_POWERPARAMS", MotGetPowerParams),
    ("MGMSG_MOT_REQ_ADCINPUTS", MotReqAdcInputs),
    ("MGMSG_MOT_GET_ADCINPUTS", MotGetAdcInputs),
    ("MGMSG_MOT_SET_GENMOVEPARAMS", MotSetGenMoveParams),
    ("MGMSG_MOT_REQ_GENMOVEPARAMS", MotReqGenMoveParams),
    ("MGMSG_MOT_GET_GENMOVEPARAMS", MotGetGenMoveParams),
    ("MGMSG_MOT_SET_HOMEPARAMS", MotSetHomeParams),
    ("MGMSG_MOT_REQ_HOMEPARAMS", MotReqHomeParams),
    ("MGMSG_MOT_GET_HOMEPARAMS", MotGetHomeParams),
    ("MGMSG_MOT_MOVE_HOME", MotMoveHome),
    ("MGMSG_MOT_MOVE_HOMED", MotMoveHomed),
    ("MGMSG_MOT_SET_MOVERELPARAMS", MotSetMoveRelParams),
    ("MGMSG_MOT_REQ_MOVERELPARAMS", MotReqMoveRelParams),
    ("MGMSG_MOT_GET_MOVERELPARAMS", MotGetMoveRelParams),
    ("MGMSG_MOT_MOVE_RELATIVE", MotMoveRelative),
    ("MGMSG_MOT_SET_MOVEABSPARAMS", MotSetMoveAbsParams),
    ("MGMSG_MOT_REQ_MOVEABSPARAMS", MotReqMoveAbsParams),
    ("MGMSG_MOT_GET_MOVEABSPARAMS", MotGetMoveAbsParams),
    ("MGMSG_MOT_MOVE_ABSOLUTE", MotMoveAbsolute),
    ("MGMSG_MOT_MOVE_VELOCITY", MotMoveVelocity),
    ("MGMSG_MOT_MOVE_COMPLETED", MotMoveCompleted),
    ("MGMSG_MOT_MOVE_STOP", MotMoveStop),
    ("MGMSG_MOT_MOVE_STOPPED", MotMoveStopped),
    ("MGMSG_MOT_MOVE_JOG", MotMoveJog),
    ("MGMSG_MOT_GET_DCSTATUSUPDATE", MotGetDcStatusUpdate),
    ("MGMSG_MOT_SET_DCPIDPARAMS", MotSetDcPidParams),
    ("MGMSG_MOT_REQ_DCPIDPARAMS", MotReqDcPidParams),
    ("MGMSG_MOT_GET_DCPIDPARAMS", MotGetDcPidParams),
    ("MGMSG_MOT_SET_POTPARAMS", MotSetPotParams),
    ("MGMSG_MOT_REQ_POTPARAMS", MotReqPotParams),
    ("MGMSG_MOT_GET_POTPARAMS", MotGetPotParams),
    ("MGMSG_MOT_SET_AVMODES", MotSetAvModes),
    ("MGMSG_MOT_REQ_AVMODES", MotReqAvModes),
    ("MGMSG_MOT_GET_AVMODES", MotGetAvModes),
    ("MGMSG_MOT_SET_BUTTONPARAMS", MotSetButtonParams),
    ("MGMSG_MOT_REQ_BUTTONPARAMS", MotReqButtonParams),
    ("MGMSG_MOT_GET_BUTTONPARAMS", MotGetButtonParams),
    ("MGMSG_MOT_SET_EEPROMPARAMS", MotSetEepromParams),
    ("MGMSG_MOT_SET_POSITIONLOOPPARAMS", MotSetPositionLoopParams),
    ("MGMSG_MOT_REQ_POSITIONLOOPPARAMS", MotReqPositionLoopParams),
    ("MGMSG_MOT_GET_POSITIONLOOPPARAMS", MotGetPositionLoopParams),
    ("MGMSG_MOT_SET_MOTOROUTPUTPARAMS", MotSetMotorOutputParams),
    ("MGMSG_MOT_REQ_MOTOROUTPUTPARAMS", MotReqMotorOutputParams),
    ("MGMSG_MOT_GET_MOTOROUTPUTPARAMS", MotGetMotorOutputParams),
    ("MGMSG_MOT_SET_TRACKSETTLEPARAMS", MotSetTrackSettleParams),
    ("MGMSG_MOT_REQ_TRACKSETTLEPARAMS", MotReqTrackSettleParams),
    ("MGMSG_MOT_GET_TRACKSETTLEPARAMS", MotGetTrackSettleParams),
    ("MGMSG_MOT_SET_BOWINDEX", MotSetBowIndex),
    ("MGMSG_MOT_REQ_BOWINDEX", MotReqBowIndex),
    ("MGMSG_MOT_GET_BOWINDEX", MotGetBowIndex),
];

impl MessageId {
    /// Wire code of this message
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Resolve a wire code, `None` for codes outside the table
    pub fn from_code(code: u16) -> Option<Self> {
        MESSAGE_TABLE
            .iter()
            .map(|(_, id)| *id)
            .find(|id| id.code() == code)
    }

    /// Resolve a symbolic `MGMSG_*` name
    pub fn from_name(name: &str) -> Option<Self> {
        MESSAGE_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id)
    }

    /// Symbolic `MGMSG_*` name
    pub fn name(self) -> &'static str {
        MESSAGE_TABLE
            .iter()
            .find(|(_, id)| *id == self)
            .map(|(n, _)| *n)
            .unwrap_or("MGMSG_UNKNOWN")
    }

    /// Asynchronous notifications that terminate a move
    pub fn is_move_completion(self) -> bool {
        matches!(self, MotMoveCompleted | MotMoveHomed | MotMoveStopped)
    }

    /// Error reports the controller sends in place of a reply
    pub fn is_error_report(self) -> bool {
        matches!(self, HwResponse | HwRichResponse)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#06x})", self.name(), self.code())
    }
}

/// Name of a raw wire code for logging, falling back to hex
pub fn describe(code: u16) -> String {
    match MessageId::from_code(code) {
        Some(id) => id.to_string(),
        None => format!("{:#06x}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_known_codes() {
        assert_eq!(MotMoveCompleted.code(), 0x0464);
        assert_eq!(MotReqVelParams.code(), 0x0414);
        assert_eq!(MessageId::from_code(0x0444), Some(MotMoveHomed));
        assert_eq!(MessageId::from_code(0x9999), None);
    }

    #[test]
    fn test_table_is_consistent() {
        let mut codes = HashSet::new();
        let mut names = HashSet::new();
        for (name, id) in MESSAGE_TABLE {
            assert!(codes.insert(id.code()), "duplicate code for {}", name);
            assert!(names.insert(*name), "duplicate name {}", name);
            assert_eq!(MessageId::from_name(name), Some(*id));
            assert_eq!(id.name(), *name);
        }
    }

    #[test]
    fn test_completion_family() {
        assert!(MotMoveCompleted.is_move_completion());
        assert!(MotMoveHomed.is_move_completion());
        assert!(MotMoveStopped.is_move_completion());
        assert!(!MotMoveStop.is_move_completion());
        assert!(!MotGetDcStatusUpdate.is_move_completion());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(0x0223), "MGMSG_MOD_IDENTIFY (0x0223)");
        assert_eq!(describe(0x7777), "0x7777");
    }
}
