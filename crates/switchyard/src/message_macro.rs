//! Macros for reducing message boilerplate.

/// Implement `as_serialize()` for messages that derive `Serialize`.
///
/// Use this inside a hand-written `Message` impl block. Serializable messages
/// get their payload in trace logs and become eligible for query caching.
///
/// # Example
///
/// ```ignore
/// use switchyard_core::{serializable, Message, MessageKind};
/// use serde::Serialize;
///
/// #[derive(Debug, Clone, Serialize)]
/// struct FindUser {
///     id: Uuid,
/// }
///
/// impl Message for FindUser {
///     const KIND: MessageKind = MessageKind::Query;
///
///     serializable!();
/// }
/// ```
#[macro_export]
macro_rules! serializable {
    () => {
        fn as_serialize(&self) -> Option<&dyn $crate::erased_serde::Serialize> {
            Some(self)
        }
    };
}

/// Implement [`Message`](crate::Message) in one line.
///
/// ```ignore
/// message!(CreateUser: Command);
/// message!(FindUser: Query, serializable);
/// message!(billing::UserCreated: Event, key = "BillingUserCreated");
/// message!(audit::UserCreated: Event, key = "AuditUserCreated", serializable);
/// ```
///
/// `key` overrides the registry key derived from the type name.
#[macro_export]
macro_rules! message {
    ($ty:ty : $kind:ident) => {
        impl $crate::Message for $ty {
            const KIND: $crate::MessageKind = $crate::MessageKind::$kind;
        }
    };
    ($ty:ty : $kind:ident, serializable) => {
        impl $crate::Message for $ty {
            const KIND: $crate::MessageKind = $crate::MessageKind::$kind;

            $crate::serializable!();
        }
    };
    ($ty:ty : $kind:ident, key = $key:literal) => {
        impl $crate::Message for $ty {
            const KIND: $crate::MessageKind = $crate::MessageKind::$kind;

            fn type_key() -> $crate::TypeKey {
                $crate::TypeKey::new($key)
            }
        }
    };
    ($ty:ty : $kind:ident, key = $key:literal, serializable) => {
        impl $crate::Message for $ty {
            const KIND: $crate::MessageKind = $crate::MessageKind::$kind;

            fn type_key() -> $crate::TypeKey {
                $crate::TypeKey::new($key)
            }

            $crate::serializable!();
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Message, MessageKind};
    use serde::Serialize;

    mod billing {
        #[derive(Debug)]
        pub struct UserCreated;
    }

    mod audit {
        #[derive(Debug, serde::Serialize)]
        pub struct UserCreated {
            pub id: u32,
        }
    }

    #[derive(Debug, Serialize)]
    struct FindUser {
        id: u32,
    }

    crate::message!(FindUser: Query, serializable);
    crate::message!(billing::UserCreated: Event, key = "BillingUserCreated");
    crate::message!(audit::UserCreated: Event, key = "AuditUserCreated", serializable);

    #[test]
    fn default_key_is_the_short_type_name() {
        assert_eq!(FindUser::type_key().as_str(), "FindUser");
        assert_eq!(FindUser::KIND, MessageKind::Query);
    }

    #[test]
    fn explicit_keys_separate_types_with_equal_names() {
        assert_eq!(billing::UserCreated::type_key().as_str(), "BillingUserCreated");
        assert_eq!(audit::UserCreated::type_key().as_str(), "AuditUserCreated");
    }

    #[test]
    fn serializable_messages_expose_their_payload() {
        let message = audit::UserCreated { id: 9 };
        let value = serde_json::to_value(message.as_serialize().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({ "id": 9 }));
        assert!(billing::UserCreated.as_serialize().is_none());
    }
}
