//! Well-known property tags.

use crate::property::{PropertyTag, PropertyType};

macro_rules! well_known_tags {
    ($($name:ident = ($id:expr, $ty:ident), $pid:literal;)*) => {
        $(pub const $name: PropertyTag = PropertyTag::new($id, PropertyType::$ty);)*

        /// Every well-known tag with its canonical name.
        pub const ALL: &[(&str, PropertyTag)] = &[$(($pid, $name)),*];
    };
}

well_known_tags! {
    IMPORTANCE = (0x0017, Integer32), "PidTagImportance";
    MESSAGE_CLASS = (0x001A, String), "PidTagMessageClass";
    PRIORITY = (0x0026, Integer32), "PidTagPriority";
    SENSITIVITY = (0x0036, Integer32), "PidTagSensitivity";
    SUBJECT = (0x0037, String), "PidTagSubject";
    SUBJECT_PREFIX = (0x003D, String), "PidTagSubjectPrefix";
    DISPLAY_BCC = (0x0E02, String), "PidTagDisplayBcc";
    DISPLAY_CC = (0x0E03, String), "PidTagDisplayCc";
    DISPLAY_TO = (0x0E04, String), "PidTagDisplayTo";
    MESSAGE_FLAGS = (0x0E07, Integer32), "PidTagMessageFlags";
    MESSAGE_SIZE = (0x0E08, Integer32), "PidTagMessageSize";
    MESSAGE_STATUS = (0x0E17, Integer32), "PidTagMessageStatus";
    HAS_ATTACHMENTS = (0x0E1B, Boolean), "PidTagHasAttachments";
    NORMALIZED_SUBJECT = (0x0E1D, String), "PidTagNormalizedSubject";
    ATTACH_SIZE = (0x0E20, Integer32), "PidTagAttachSize";
    ATTACH_NUMBER = (0x0E21, Integer32), "PidTagAttachNumber";
    READ = (0x0E69, Boolean), "PidTagRead";
    TRUST_SENDER = (0x0E79, Integer32), "PidTagTrustSender";
    ACCESS = (0x0FF4, Integer32), "PidTagAccess";
    ACCESS_LEVEL = (0x0FF7, Integer32), "PidTagAccessLevel";
    RECORD_KEY = (0x0FF9, Binary), "PidTagRecordKey";
    OBJECT_TYPE = (0x0FFE, Integer32), "PidTagObjectType";
    BODY = (0x1000, String), "PidTagBody";
    DISPLAY_NAME = (0x3001, String), "PidTagDisplayName";
    CREATION_TIME = (0x3007, Time), "PidTagCreationTime";
    LAST_MODIFICATION_TIME = (0x3008, Time), "PidTagLastModificationTime";
    SEARCH_KEY = (0x300B, Binary), "PidTagSearchKey";
    ATTACH_DATA_BINARY = (0x3701, Binary), "PidTagAttachDataBinary";
    ATTACH_EXTENSION = (0x3703, String), "PidTagAttachExtension";
    ATTACH_FILENAME = (0x3704, String), "PidTagAttachFilename";
    ATTACH_METHOD = (0x3705, Integer32), "PidTagAttachMethod";
    ATTACH_LONG_FILENAME = (0x3707, String), "PidTagAttachLongFilename";
    RENDERING_POSITION = (0x370B, Integer32), "PidTagRenderingPosition";
    ATTACH_LONG_PATHNAME = (0x370D, String), "PidTagAttachLongPathname";
    ATTACH_MIME_TAG = (0x370E, String), "PidTagAttachMimeTag";
    ATTACH_CONTENT_ID = (0x3712, String), "PidTagAttachContentId";
    MESSAGE_LOCALE_ID = (0x3FF1, Integer32), "PidTagMessageLocaleId";
    CREATOR_NAME = (0x3FF8, String), "PidTagCreatorName";
    CREATOR_ENTRY_ID = (0x3FF9, Binary), "PidTagCreatorEntryId";
    LAST_MODIFIER_NAME = (0x3FFA, String), "PidTagLastModifierName";
    LAST_MODIFIER_ENTRY_ID = (0x3FFB, Binary), "PidTagLastModifierEntryId";
    MESSAGE_CODEPAGE = (0x3FFD, Integer32), "PidTagMessageCodepage";
    CHANGE_KEY = (0x65E2, Binary), "PidTagChangeKey";
    HAS_NAMED_PROPERTIES = (0x664A, Boolean), "PidTagHasNamedProperties";
    MID = (0x674A, Integer64), "PidTagMid";
    LOCALE_ID = (0x66A1, Integer32), "PidTagLocaleId";
    LOCAL_COMMIT_TIME = (0x6709, Time), "PidTagLocalCommitTime";
}

/// Look up a well-known tag by name.
pub fn by_name(name: &str) -> Option<PropertyTag> {
    ALL.iter().find(|(n, _)| *n == name).map(|(_, tag)| *tag)
}

/// The canonical name of a well-known tag.
pub fn name_of(tag: PropertyTag) -> Option<&'static str> {
    ALL.iter().find(|(_, t)| *t == tag).map(|(n, _)| *n)
}
