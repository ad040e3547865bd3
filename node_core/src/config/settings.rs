use std::collections::HashMap;

/// One configuration value as read from a settings source.
#[derive(Clone, Debug, PartialEq)]
pub enum Setting {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl Setting {
    fn as_string(&self) -> Option<&String> {
        match self {
            Setting::String(value) => Some(value),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Setting::Int(value) => Some(*value),
            _ => None,
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            Setting::Double(value) => Some(*value),
            Setting::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Setting::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Type name used in configuration error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Setting::String(_) => "string",
            Setting::Int(_) => "int",
            Setting::Double(_) => "double",
            Setting::Bool(_) => "bool",
        }
    }
}

/// Key-value view over dotted configuration keys such as `server.log_calls`.
pub trait Settings {
    fn get(&self, key: &str) -> Option<Setting>;
    fn set(&mut self, key: &str, value: Setting);

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)?.as_string().cloned()
    }
    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_int()
    }
    /// Integers are widened.
    fn get_double(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_double()
    }
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.set(key, Setting::String(value));
    }
    fn set_int(&mut self, key: &str, value: i64) {
        self.set(key, Setting::Int(value));
    }
    fn set_double(&mut self, key: &str, value: f64) {
        self.set(key, Setting::Double(value));
    }
    fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, Setting::Bool(value));
    }
}

impl Settings for HashMap<String, Setting> {
    fn get(&self, key: &str) -> Option<Setting> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: Setting) {
        self.insert(key.to_string(), value);
    }
}
