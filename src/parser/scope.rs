use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScopedSymbol {
    pub depth: u32,
    /// The unique name later stages see; differs from the source name when
    /// the declaration shadows an earlier one.
    pub name: String,
    pub is_register: bool,
    pub is_function_param: bool,
}

/// Lexical scopes as a stack of entries per source name.
///
/// Function parameters are stored one level below the current depth, which
/// makes a declaration in the function's top block collide with them instead
/// of shadowing. Entries that shadow an outer declaration are renamed with a
/// `.K` suffix so every scope lifetime has a unique name for the lifetime of
/// the enclosing function.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Vec<ScopedSymbol>>,
    depth: u32,
    rename_counts: HashMap<String, u32>,
    auto_locals: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ScopedSymbol> {
        self.symbols.get(name).and_then(|stack| stack.last())
    }

    /// Declare `name` in the current scope. Returns the unique name on
    /// success, or `None` when the topmost entry already occupies this depth
    /// and is not a register.
    pub fn insert(
        &mut self,
        name: &str,
        is_register: bool,
        is_function_param: bool,
    ) -> Option<String> {
        let depth = self.depth;
        let stack = self.symbols.entry(name.to_string()).or_default();
        if let Some(top) = stack.last() {
            if !top.is_register && top.depth >= depth {
                return None;
            }
        }

        let count = self.rename_counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        let unique = if *count == 1 {
            name.to_string()
        } else {
            format!("{}.{}", name, *count - 1)
        };

        stack.push(ScopedSymbol {
            depth: if is_function_param { depth + 1 } else { depth },
            name: unique.clone(),
            is_register,
            is_function_param,
        });

        if !is_register && !is_function_param {
            self.auto_locals.push(unique.clone());
        }

        Some(unique)
    }

    pub fn enter_scope(&mut self) {
        self.depth += 1;
    }

    pub fn leave_scope(&mut self) {
        for stack in self.symbols.values_mut() {
            while stack.last().is_some_and(|symbol| symbol.depth >= self.depth) {
                stack.pop();
            }
        }
        self.depth -= 1;
    }

    /// Drain the unique names of every `auto` declaration seen since the
    /// last reset.
    pub fn collect_auto_locals(&mut self) -> Vec<String> {
        std::mem::take(&mut self.auto_locals)
    }

    pub fn reset(&mut self) {
        self.symbols.clear();
        self.rename_counts.clear();
        self.auto_locals.clear();
        self.depth = 0;
    }
}
