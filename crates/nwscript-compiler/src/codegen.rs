//! NCS code generation.
//!
//! Walks the typed AST and emits the linear byte-encoded opcode stream.
//! The generator keeps a simulated stack depth in bytes, a map from live
//! variables to frame offsets, and a fixup table of call sites awaiting
//! their callee's entry address. Functions are generated on demand
//! starting from the entry point; call cycles are rejected up front from
//! the call graph.
//!
//! Layout of an emitted file:
//!
//! ```text
//! "NCS V1.0"            8-byte magic
//! T <u32 length>        size record
//! <entry stub>          optional RSADDI, JSR #globals|main, RETN
//! #globals              only when plain globals exist
//! main, callees...      functions in first-call order
//! ```

use crate::opcode::{aux, op, FILE_MAGIC, HEADER_SIZE};
use indexmap::IndexMap;
use nwscript_ast::ast::{BinaryOp, Expr, ExprKind, LValue, UnaryOp, VecComponent};
use nwscript_ast::{
    Block, Constant, Diagnostic, ErrorKind, Program, SourceMap, Span, Stmt, SymbolId, SymbolKind,
    SymbolTable, Type,
};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Object handle immediates.
pub const OBJECT_SELF: u32 = 0;
pub const OBJECT_INVALID: u32 = 1;

/// Debug records collected during emission, consumed by the NDB writer.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub files: Vec<String>,
    pub functions: Vec<FuncRecord>,
    pub lines: Vec<LineRecord>,
    pub variables: Vec<VarRecord>,
}

#[derive(Debug, Clone)]
pub struct FuncRecord {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub ret: Type,
    pub params: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct LineRecord {
    pub file: u16,
    pub line: u32,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone)]
pub struct VarRecord {
    pub name: String,
    pub ty: Type,
    /// Frame-relative offset of the slot start (BP-relative for globals)
    pub offset: i32,
    pub start: u32,
    pub end: u32,
}

/// Generated artifacts for one unit.
pub struct CodegenOutput {
    pub code: Vec<u8>,
    pub debug: DebugInfo,
}

/// A not-yet-patched jump operand.
#[derive(Debug, Clone, Copy)]
struct JumpSite {
    /// Byte index of the 4-byte operand within the instruction stream
    operand_at: usize,
    /// Absolute file address of the instruction's opcode byte
    instr_addr: u32,
}

/// A call site waiting for its callee to be placed.
struct CallFixup {
    site: JumpSite,
    target: SymbolId,
}

struct LocalSlot {
    symbol: SymbolId,
    /// Frame depth just past this slot's storage
    pos: i32,
    size: u16,
    /// Index of this slot's pending debug record
    record: usize,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum CtxKind {
    Loop,
    Switch,
}

struct LoopCtx {
    kind: CtxKind,
    sp_entry: i32,
    break_sites: Vec<JumpSite>,
    cont_sites: Vec<JumpSite>,
}

pub struct CodeGen<'a> {
    program: &'a Program,
    symbols: &'a SymbolTable,
    sources: &'a SourceMap,
    /// Emit every defined function, reachable or not
    keep_unreachable: bool,

    code: Vec<u8>,
    /// Simulated frame depth in bytes
    sp: i32,
    /// Size of the global (BP) frame in bytes
    bp_size: i32,
    /// BP-relative end offsets of plain globals
    global_pos: IndexMap<SymbolId, (i32, u16)>,
    locals: Vec<LocalSlot>,
    loops: Vec<LoopCtx>,
    entries: IndexMap<SymbolId, u32>,
    fixups: Vec<CallFixup>,
    pending: VecDeque<SymbolId>,
    debug: DebugInfo,
}

impl<'a> CodeGen<'a> {
    pub fn new(
        program: &'a Program,
        symbols: &'a SymbolTable,
        sources: &'a SourceMap,
        optimize: bool,
    ) -> Self {
        Self {
            program,
            symbols,
            sources,
            keep_unreachable: !optimize,
            code: Vec::new(),
            sp: 0,
            bp_size: 0,
            global_pos: IndexMap::new(),
            locals: Vec::new(),
            loops: Vec::new(),
            entries: IndexMap::new(),
            fixups: Vec::new(),
            pending: VecDeque::new(),
            debug: DebugInfo::default(),
        }
    }

    /// Generate the complete `.ncs` byte stream.
    pub fn generate(mut self) -> Result<CodegenOutput, Diagnostic> {
        let entry = self.find_entry()?;
        self.check_recursion()?;

        self.debug.files = self.sources.iter().map(|f| f.name.clone()).collect();

        let entry_sym = self.symbols.get(entry);
        let entry_ret = entry_sym.ty;
        let unit_span = entry_sym.span;

        // Entry stub: reserve the entry point's return slot, call in, end.
        if entry_ret == Type::Int {
            self.emit_op(op::RSADD, aux::INT);
            self.sp += 4;
        }
        let stub_call = self.emit_jump(op::JSR);
        self.emit_op(op::RETN, aux::NONE);
        self.sp = 0;

        if self.program.globals.is_empty() {
            self.register_call_target(stub_call, entry);
        } else {
            let globals_addr = self.addr();
            self.patch_jump(stub_call, globals_addr);
            self.gen_globals(entry, entry_ret)?;
        }

        // Functions on demand, entry point first.
        self.pending.push_back(entry);
        while let Some(sym) = self.pending.pop_front() {
            if self.entries.contains_key(&sym) {
                continue;
            }
            self.gen_function(sym)?;
        }

        // The reference compiler keeps unreachable functions unless the
        // optimizer is on; they follow the reachable set in declaration
        // order.
        if self.keep_unreachable {
            let remaining: Vec<SymbolId> = self
                .program
                .functions
                .iter()
                .map(|f| f.symbol)
                .filter(|sym| !self.entries.contains_key(sym))
                .collect();
            for sym in remaining {
                self.pending.push_back(sym);
                while let Some(sym) = self.pending.pop_front() {
                    if self.entries.contains_key(&sym) {
                        continue;
                    }
                    self.gen_function(sym)?;
                }
            }
        }

        if let Some(fixup) = self.fixups.first() {
            let name = &self.symbols.get(fixup.target).name;
            return Err(Diagnostic::error(
                ErrorKind::Codegen,
                unit_span,
                format!("unresolved call to '{}'", name),
            ));
        }

        debug!(
            bytes = self.code.len(),
            functions = self.entries.len(),
            "code generation complete"
        );

        // Assemble the file: magic, size record, instruction stream.
        let total = HEADER_SIZE + self.code.len() as u32;
        let mut file = Vec::with_capacity(total as usize);
        file.extend_from_slice(FILE_MAGIC);
        file.push(op::SIZE);
        file.extend_from_slice(&total.to_be_bytes());
        file.extend_from_slice(&self.code);

        Ok(CodegenOutput {
            code: file,
            debug: self.debug,
        })
    }

    fn find_entry(&self) -> Result<SymbolId, Diagnostic> {
        for candidate in ["main", "StartingConditional"] {
            let Some(id) = self.symbols.lookup(candidate) else {
                continue;
            };
            let symbol = self.symbols.get(id);
            let defined = matches!(symbol.kind, SymbolKind::Function { defined: true, .. });
            if !defined {
                continue;
            }
            let expected = if candidate == "main" {
                Type::Void
            } else {
                Type::Int
            };
            if symbol.ty != expected {
                return Err(Diagnostic::error(
                    ErrorKind::Type,
                    symbol.span,
                    format!("'{}' must return {}", candidate, expected),
                ));
            }
            return Ok(id);
        }
        Err(Diagnostic::error(
            ErrorKind::Codegen,
            Span::zero(0),
            "script has no entry point ('void main' or 'int StartingConditional')",
        ))
    }

    // === Recursion rejection ===

    /// The VM has no per-call frame for return addresses, so call cycles
    /// are rejected during call-graph closure.
    fn check_recursion(&self) -> Result<(), Diagnostic> {
        let mut edges: IndexMap<SymbolId, Vec<SymbolId>> = IndexMap::new();
        for function in &self.program.functions {
            let mut calls = Vec::new();
            collect_block_calls(&function.body, self.symbols, &mut calls);
            edges.insert(function.symbol, calls);
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }
        let mut colors: IndexMap<SymbolId, Color> =
            edges.keys().map(|&k| (k, Color::White)).collect();

        fn visit(
            node: SymbolId,
            edges: &IndexMap<SymbolId, Vec<SymbolId>>,
            colors: &mut IndexMap<SymbolId, Color>,
            symbols: &SymbolTable,
        ) -> Result<(), Diagnostic> {
            colors.insert(node, Color::Grey);
            for &next in edges.get(&node).map(|v| v.as_slice()).unwrap_or(&[]) {
                match colors.get(&next).copied().unwrap_or(Color::Black) {
                    Color::Grey => {
                        let symbol = symbols.get(next);
                        let message = if next == node {
                            format!("function '{}' may not call itself", symbol.name)
                        } else {
                            format!("recursive call cycle involving '{}'", symbol.name)
                        };
                        return Err(Diagnostic::error(ErrorKind::Recursion, symbol.span, message));
                    }
                    Color::White => visit(next, edges, colors, symbols)?,
                    Color::Black => {}
                }
            }
            colors.insert(node, Color::Black);
            Ok(())
        }

        let roots: Vec<SymbolId> = edges.keys().copied().collect();
        for root in roots {
            if colors[&root] == Color::White {
                visit(root, &edges, &mut colors, self.symbols)?;
            }
        }
        Ok(())
    }

    // === Globals frame ===

    /// `#globals`: push every plain global, enter the BP frame, call the
    /// entry point, then unwind.
    fn gen_globals(&mut self, entry: SymbolId, entry_ret: Type) -> Result<(), Diagnostic> {
        let start = self.addr();
        self.sp = 0;
        self.locals.clear();

        // Until SAVEBP runs the globals are ordinary stack slots of this
        // frame, so their own initializers address them SP-relative.
        for global in &self.program.globals {
            let symbol = self.symbols.get(global.symbol);
            let size = symbol.ty.stack_size();
            let ty = symbol.ty;
            match &global.init {
                Some(init) => self.gen_expr(init)?,
                None => self.emit_default_slot(ty),
            }
            self.global_pos.insert(global.symbol, (self.sp, size));
            let record = self.push_var_record(global.symbol, self.sp - size as i32, start);
            self.locals.push(LocalSlot {
                symbol: global.symbol,
                pos: self.sp,
                size,
                record,
            });
        }
        self.bp_size = self.sp;

        self.emit_op(op::SAVEBP, aux::NONE);
        self.sp += 4;

        if entry_ret == Type::Int {
            self.emit_op(op::RSADD, aux::INT);
            self.sp += 4;
        }
        let call = self.emit_jump(op::JSR);
        self.register_call_target(call, entry);
        if entry_ret == Type::Int {
            // Copy the entry point's result down into the stub's slot.
            self.emit_copy(op::CPDOWNSP, -(self.sp + 4), 4);
            self.emit_movsp(-4);
        }
        self.emit_op(op::RESTOREBP, aux::NONE);
        self.sp -= 4;
        self.emit_movsp(-self.bp_size);
        self.emit_op(op::RETN, aux::NONE);

        let end = self.addr();
        for slot in self.locals.drain(..) {
            self.debug.variables[slot.record].end = end;
        }
        self.debug.functions.push(FuncRecord {
            name: "#globals".to_string(),
            start,
            end,
            ret: Type::Void,
            params: Vec::new(),
        });
        Ok(())
    }

    // === Functions ===

    fn gen_function(&mut self, sym: SymbolId) -> Result<(), Diagnostic> {
        let symbol = self.symbols.get(sym).clone();
        let Some(function) = self.program.function(sym) else {
            return Err(Diagnostic::error(
                ErrorKind::Name,
                symbol.span,
                format!("function '{}' was declared but never defined", symbol.name),
            ));
        };

        let start = self.addr();
        self.entries.insert(sym, start);
        trace!(function = %symbol.name, addr = format!("{:08X}", start), "emit");

        // Frame base sits below the first parameter; the caller has
        // already pushed arguments left to right.
        self.sp = 0;
        self.locals.clear();
        let mut param_types = Vec::new();
        for &param_id in &function.params {
            let param = self.symbols.get(param_id);
            let size = param.ty.stack_size();
            self.sp += size as i32;
            let record = self.push_var_record(param_id, self.sp - size as i32, start);
            self.locals.push(LocalSlot {
                symbol: param_id,
                pos: self.sp,
                size,
                record,
            });
            param_types.push(param.ty);
        }
        let params_bytes = self.sp;

        let terminated = self.gen_block_stmts(&function.body)?;

        if !terminated {
            if symbol.ty != Type::Void {
                return Err(Diagnostic::error(
                    ErrorKind::Type,
                    function.span,
                    format!(
                        "function '{}' does not return a value on every path",
                        symbol.name
                    ),
                ));
            }
            if self.sp != params_bytes {
                return Err(Diagnostic::error(
                    ErrorKind::Codegen,
                    function.span,
                    format!("internal stack imbalance in '{}'", symbol.name),
                ));
            }
            self.emit_movsp_raw(-self.sp);
            self.emit_op(op::RETN, aux::NONE);
        }

        let end = self.addr();
        for slot in self.locals.drain(..) {
            self.debug.variables[slot.record].end = end;
        }
        self.debug.functions.push(FuncRecord {
            name: symbol.name.to_string(),
            start,
            end,
            ret: symbol.ty,
            params: param_types,
        });

        // Resolve call sites that were waiting on this function.
        let mut patched = Vec::new();
        self.fixups.retain(|fixup| {
            if fixup.target == sym {
                patched.push(fixup.site);
                false
            } else {
                true
            }
        });
        for site in patched {
            self.patch_jump(site, start);
        }
        Ok(())
    }

    // === Statements ===

    /// Generate a block's statements in the current scope. Returns true
    /// when control cannot fall out of the block.
    fn gen_block_stmts(&mut self, block: &Block) -> Result<bool, Diagnostic> {
        for stmt in &block.stmts {
            if self.gen_stmt(stmt)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<bool, Diagnostic> {
        match stmt {
            Stmt::Empty => Ok(false),
            Stmt::Expr(expr) => {
                let start = self.addr();
                self.gen_expr(expr)?;
                let size = expr.ty.stack_size() as i32;
                if size > 0 {
                    self.emit_movsp(-size);
                }
                self.push_line_record(expr.span, start);
                Ok(false)
            }
            Stmt::Decl(decls) => {
                for decl in decls {
                    let start = self.addr();
                    let symbol = self.symbols.get(decl.symbol);
                    let ty = symbol.ty;
                    let size = ty.stack_size();
                    match &decl.init {
                        Some(init) => self.gen_expr(init)?,
                        None => self.emit_default_slot(ty),
                    }
                    let record = self.push_var_record(decl.symbol, self.sp - size as i32, start);
                    self.locals.push(LocalSlot {
                        symbol: decl.symbol,
                        pos: self.sp,
                        size,
                        record,
                    });
                    self.push_line_record(decl.span, start);
                }
                Ok(false)
            }
            Stmt::Block(block) => {
                let mark = self.locals.len();
                let sp_entry = self.sp;
                let terminated = self.gen_block_stmts(block)?;
                let end = self.addr();
                for slot in self.locals.drain(mark..) {
                    self.debug.variables[slot.record].end = end;
                }
                if !terminated && self.sp != sp_entry {
                    self.emit_movsp(sp_entry - self.sp);
                }
                if terminated {
                    self.sp = sp_entry;
                }
                Ok(terminated)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let start = self.addr();
                self.gen_truth(cond)?;
                self.push_line_record(cond.span, start);
                let to_else = self.emit_jump(op::JZ);
                self.sp -= 4;

                let then_term = self.gen_stmt(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let to_end = self.emit_jump(op::JMP);
                        let else_addr = self.addr();
                        self.patch_jump(to_else, else_addr);
                        let else_term = self.gen_stmt(else_branch)?;
                        let end = self.addr();
                        self.patch_jump(to_end, end);
                        Ok(then_term && else_term)
                    }
                    None => {
                        let end = self.addr();
                        self.patch_jump(to_else, end);
                        Ok(false)
                    }
                }
            }
            Stmt::While { cond, body } => {
                let top = self.addr();
                self.gen_truth(cond)?;
                self.push_line_record(cond.span, top);
                let exit = self.emit_jump(op::JZ);
                self.sp -= 4;

                self.loops.push(LoopCtx {
                    kind: CtxKind::Loop,
                    sp_entry: self.sp,
                    break_sites: vec![exit],
                    cont_sites: Vec::new(),
                });
                let body_result = self.gen_stmt(body);
                let ctx = self.loops.pop().expect("loop context pushed above");
                body_result?;

                let back = self.emit_jump(op::JMP);
                self.patch_jump(back, top);
                let end = self.addr();
                for site in ctx.break_sites {
                    self.patch_jump(site, end);
                }
                for site in ctx.cont_sites {
                    self.patch_jump(site, top);
                }
                Ok(false)
            }
            Stmt::DoWhile { body, cond } => {
                let top = self.addr();
                self.loops.push(LoopCtx {
                    kind: CtxKind::Loop,
                    sp_entry: self.sp,
                    break_sites: Vec::new(),
                    cont_sites: Vec::new(),
                });
                let body_result = self.gen_stmt(body);
                let ctx = self.loops.pop().expect("loop context pushed above");
                body_result?;

                let cond_addr = self.addr();
                self.gen_truth(cond)?;
                let back = self.emit_jump(op::JNZ);
                self.sp -= 4;
                self.patch_jump(back, top);

                let end = self.addr();
                for site in ctx.break_sites {
                    self.patch_jump(site, end);
                }
                for site in ctx.cont_sites {
                    self.patch_jump(site, cond_addr);
                }
                Ok(false)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    let start = self.addr();
                    self.gen_expr(init)?;
                    let size = init.ty.stack_size() as i32;
                    if size > 0 {
                        self.emit_movsp(-size);
                    }
                    self.push_line_record(init.span, start);
                }
                let top = self.addr();
                let exit = match cond {
                    Some(cond) => {
                        self.gen_truth(cond)?;
                        let exit = self.emit_jump(op::JZ);
                        self.sp -= 4;
                        Some(exit)
                    }
                    None => None,
                };

                self.loops.push(LoopCtx {
                    kind: CtxKind::Loop,
                    sp_entry: self.sp,
                    break_sites: exit.into_iter().collect(),
                    cont_sites: Vec::new(),
                });
                let body_result = self.gen_stmt(body);
                let ctx = self.loops.pop().expect("loop context pushed above");
                body_result?;

                let step_addr = self.addr();
                if let Some(step) = step {
                    self.gen_expr(step)?;
                    let size = step.ty.stack_size() as i32;
                    if size > 0 {
                        self.emit_movsp(-size);
                    }
                }
                let back = self.emit_jump(op::JMP);
                self.patch_jump(back, top);

                let end = self.addr();
                for site in ctx.break_sites {
                    self.patch_jump(site, end);
                }
                for site in ctx.cont_sites {
                    self.patch_jump(site, step_addr);
                }
                Ok(false)
            }
            Stmt::Switch { value, cases, .. } => self.gen_switch(value, cases),
            Stmt::Break(_) => {
                let sp_entry = self
                    .loops
                    .last()
                    .expect("parser rejects 'break' outside loop or switch")
                    .sp_entry;
                let pop = sp_entry - self.sp;
                if pop != 0 {
                    self.emit_movsp_raw(pop);
                }
                let site = self.emit_jump(op::JMP);
                self.loops
                    .last_mut()
                    .expect("checked above")
                    .break_sites
                    .push(site);
                Ok(true)
            }
            Stmt::Continue(_) => {
                let idx = self
                    .loops
                    .iter()
                    .rposition(|c| c.kind == CtxKind::Loop)
                    .expect("parser rejects 'continue' outside loop");
                let pop = self.loops[idx].sp_entry - self.sp;
                if pop != 0 {
                    self.emit_movsp_raw(pop);
                }
                let site = self.emit_jump(op::JMP);
                self.loops[idx].cont_sites.push(site);
                Ok(true)
            }
            Stmt::Return { value, span } => {
                let start = self.addr();
                let sp_entry = self.sp;
                if let Some(value) = value {
                    let ret_size = value.ty.stack_size() as i32;
                    self.gen_expr(value)?;
                    self.emit_copy(op::CPDOWNSP, -(self.sp + ret_size), ret_size as u16);
                }
                self.emit_movsp_raw(-self.sp);
                self.emit_op(op::RETN, aux::NONE);
                self.sp = sp_entry;
                self.push_line_record(*span, start);
                Ok(true)
            }
        }
    }

    fn gen_switch(
        &mut self,
        value: &Expr,
        cases: &[nwscript_ast::SwitchCase],
    ) -> Result<bool, Diagnostic> {
        let sp_entry = self.sp;
        let start = self.addr();
        self.gen_expr(value)?;
        self.push_line_record(value.span, start);
        let value_size = value.ty.stack_size() as i32;

        // Dispatch: duplicate, compare, jump per labelled case.
        let mut case_sites: Vec<(usize, JumpSite)> = Vec::new();
        let mut default_index = None;
        for (index, case) in cases.iter().enumerate() {
            let Some(label) = &case.label else {
                default_index = Some(index);
                continue;
            };
            self.emit_copy(op::CPTOPSP, -value_size, value_size as u16);
            self.sp += value_size;
            self.gen_const(label);
            let pair = if value.ty == Type::String {
                aux::STRING_STRING
            } else {
                aux::INT_INT
            };
            self.emit_op(op::EQUAL, pair);
            self.sp -= value_size + 4 - 4;
            let site = self.emit_jump(op::JNZ);
            self.sp -= 4;
            case_sites.push((index, site));
        }
        let no_match = self.emit_jump(op::JMP);

        // Case bodies in declared order; fallthrough is sequential.
        let mut body_addrs = vec![0u32; cases.len()];
        let mark = self.locals.len();
        self.loops.push(LoopCtx {
            kind: CtxKind::Switch,
            sp_entry,
            break_sites: Vec::new(),
            cont_sites: Vec::new(),
        });
        let mut result = Ok(());
        'bodies: for (index, case) in cases.iter().enumerate() {
            body_addrs[index] = self.addr();
            for stmt in &case.stmts {
                match self.gen_stmt(stmt) {
                    Ok(true) => {
                        self.sp = sp_entry + value_size;
                        continue 'bodies;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        result = Err(err);
                        break 'bodies;
                    }
                }
            }
        }
        let ctx = self.loops.pop().expect("switch context pushed above");
        result?;
        self.locals.truncate(mark);

        for (index, site) in case_sites {
            self.patch_jump(site, body_addrs[index]);
        }

        // Fallthrough and no-match both pop the tested value; break sites
        // already popped it themselves and land after the pop.
        let pop_addr = self.addr();
        match default_index {
            Some(index) => self.patch_jump(no_match, body_addrs[index]),
            None => self.patch_jump(no_match, pop_addr),
        }
        self.emit_movsp(-value_size);
        let end = self.addr();
        for site in ctx.break_sites {
            self.patch_jump(site, end);
        }
        Ok(false)
    }

    // === Expressions ===

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        match &expr.kind {
            ExprKind::Constant(c) => {
                self.gen_const(c);
                Ok(())
            }
            ExprKind::Var(symbol) => {
                self.gen_var_read(*symbol, expr.span)?;
                Ok(())
            }
            ExprKind::VectorLit(parts) => {
                for part in parts {
                    self.gen_expr(part)?;
                }
                Ok(())
            }
            ExprKind::Call { callee, args } => self.gen_call(*callee, args, expr.span),
            ExprKind::Unary { op: un_op, operand } => {
                self.gen_expr(operand)?;
                match (un_op, operand.ty) {
                    (UnaryOp::Neg, Type::Int) => self.emit_op(op::NEG, aux::INT),
                    (UnaryOp::Neg, Type::Float) => self.emit_op(op::NEG, aux::FLOAT),
                    (UnaryOp::Comp, _) => self.emit_op(op::COMP, aux::INT),
                    (UnaryOp::Not, Type::Object) => {
                        // !object tests against OBJECT_INVALID.
                        self.gen_const(&Constant::Object(OBJECT_INVALID));
                        self.emit_op(op::EQUAL, aux::OBJECT_OBJECT);
                        self.sp -= 4;
                    }
                    (UnaryOp::Not, _) => self.emit_op(op::NOT, aux::INT),
                    (un_op, ty) => {
                        return Err(Diagnostic::error(
                            ErrorKind::Codegen,
                            expr.span,
                            format!("operator '{}' on {} survived checking", un_op.symbol(), ty),
                        ));
                    }
                }
                Ok(())
            }
            ExprKind::Binary { op: bin_op, lhs, rhs } => {
                self.gen_binary(*bin_op, lhs, rhs, expr.span)
            }
            ExprKind::Assign { target, op, value } => {
                match op {
                    None => self.gen_expr(value)?,
                    Some(bin_op) => {
                        // Compound: read, combine, store.
                        let current_ty = self.gen_lvalue_read(target)?;
                        self.gen_expr(value)?;
                        let pair = self.binary_aux(*bin_op, current_ty, value.ty, value.span)?;
                        self.emit_binary_op(*bin_op, pair, current_ty, value.ty);
                    }
                }
                self.gen_lvalue_store(target)?;
                Ok(())
            }
            ExprKind::IncDec {
                target,
                decrement,
                postfix,
            } => self.gen_incdec(target, *decrement, *postfix),
            ExprKind::Ternary {
                cond,
                then_val,
                else_val,
            } => {
                let size = then_val.ty.stack_size() as i32;
                self.gen_truth(cond)?;
                let to_else = self.emit_jump(op::JZ);
                self.sp -= 4;
                let sp_before = self.sp;

                self.gen_expr(then_val)?;
                let to_end = self.emit_jump(op::JMP);
                let else_addr = self.addr();
                self.patch_jump(to_else, else_addr);
                self.sp = sp_before;
                self.gen_expr(else_val)?;
                let end = self.addr();
                self.patch_jump(to_end, end);
                self.sp = sp_before + size;
                Ok(())
            }
            ExprKind::Member { base, component } => {
                if let ExprKind::Var(symbol) = base.kind {
                    self.gen_component_read(symbol, *component, base.span)
                } else {
                    self.gen_expr(base)?;
                    self.emit_op(op::DESTRUCT, aux::STACK);
                    self.emit_u16(12);
                    self.emit_u16(component.offset());
                    self.emit_u16(4);
                    self.sp -= 8;
                    Ok(())
                }
            }
            ExprKind::IntToFloat(inner) => {
                // The VM converts mixed int/float pairings itself; adding
                // 0.0 with the FI pairing widens without a dedicated
                // conversion opcode.
                self.gen_expr(inner)?;
                self.gen_const(&Constant::Float(0.0));
                self.emit_op(op::ADD, aux::INT_FLOAT);
                self.sp -= 4;
                Ok(())
            }
        }
    }

    fn gen_binary(
        &mut self,
        bin_op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<(), Diagnostic> {
        // Short-circuit logical operators lower to tests and jumps.
        if matches!(bin_op, BinaryOp::LogAnd | BinaryOp::LogOr) {
            let first_jump = if bin_op == BinaryOp::LogAnd {
                op::JZ
            } else {
                op::JNZ
            };
            self.gen_truth(lhs)?;
            let short_a = self.emit_jump(first_jump);
            self.sp -= 4;
            self.gen_truth(rhs)?;
            let short_b = self.emit_jump(first_jump);
            self.sp -= 4;

            let (long_value, short_value) = if bin_op == BinaryOp::LogAnd {
                (1, 0)
            } else {
                (0, 1)
            };
            self.gen_const(&Constant::Int(long_value));
            self.sp -= 4; // counted once below
            let to_end = self.emit_jump(op::JMP);
            let short_addr = self.addr();
            self.patch_jump(short_a, short_addr);
            self.patch_jump(short_b, short_addr);
            self.gen_const(&Constant::Int(short_value));
            self.sp -= 4;
            let end = self.addr();
            self.patch_jump(to_end, end);
            self.sp += 4;
            return Ok(());
        }

        self.gen_expr(lhs)?;
        self.gen_expr(rhs)?;
        let pair = self.binary_aux(bin_op, lhs.ty, rhs.ty, span)?;
        self.emit_binary_op(bin_op, pair, lhs.ty, rhs.ty);
        Ok(())
    }

    /// Emit the opcode for a checked binary operation and adjust the
    /// simulated stack.
    fn emit_binary_op(&mut self, bin_op: BinaryOp, pair: u8, lty: Type, rty: Type) {
        use BinaryOp as B;
        let opcode = match bin_op {
            B::Add => op::ADD,
            B::Sub => op::SUB,
            B::Mul => op::MUL,
            B::Div => op::DIV,
            B::Mod => op::MOD,
            B::Shl => op::SHLEFT,
            B::Shr => op::SHRIGHT,
            B::Ushr => op::USHRIGHT,
            B::BitAnd => op::BOOLAND,
            B::BitOr => op::INCOR,
            B::BitXor => op::EXCOR,
            B::Eq => op::EQUAL,
            B::Ne => op::NEQUAL,
            B::Lt => op::LT,
            B::Le => op::LEQ,
            B::Gt => op::GT,
            B::Ge => op::GEQ,
            B::LogAnd => op::LOGAND,
            B::LogOr => op::LOGOR,
        };
        self.emit_op(opcode, pair);
        if pair == aux::STRUCT_STRUCT {
            self.emit_u16(12);
        }

        let operands = lty.stack_size() as i32 + rty.stack_size() as i32;
        let result = if bin_op.is_comparison() {
            4
        } else {
            // Arithmetic result takes the wider operand's size.
            lty.stack_size().max(rty.stack_size()) as i32
        };
        self.sp -= operands - result;
    }

    /// Aux pairing byte for a type-checked binary operation.
    fn binary_aux(
        &self,
        bin_op: BinaryOp,
        lty: Type,
        rty: Type,
        span: Span,
    ) -> Result<u8, Diagnostic> {
        use Type as T;
        let pair = match (lty, rty) {
            (T::Int, T::Int) => aux::INT_INT,
            (T::Float, T::Float) => aux::FLOAT_FLOAT,
            (T::Int, T::Float) => aux::INT_FLOAT,
            (T::Float, T::Int) => aux::FLOAT_INT,
            (T::String, T::String) => aux::STRING_STRING,
            (T::Object, T::Object) => aux::OBJECT_OBJECT,
            (T::Vector, T::Vector) => {
                if bin_op.is_comparison() {
                    aux::STRUCT_STRUCT
                } else {
                    aux::VECTOR_VECTOR
                }
            }
            (T::Vector, T::Float) => aux::VECTOR_FLOAT,
            (T::Float, T::Vector) => aux::FLOAT_VECTOR,
            (T::Engine(n), T::Engine(m)) if n == m => aux::ENGINE0_PAIR + n,
            (l, r) => {
                return Err(Diagnostic::error(
                    ErrorKind::Codegen,
                    span,
                    format!("operand pairing {}/{} survived checking", l, r),
                ));
            }
        };
        Ok(pair)
    }

    /// Evaluate an expression as a truth value, leaving an int.
    fn gen_truth(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        self.gen_expr(expr)?;
        if expr.ty == Type::Object {
            self.gen_const(&Constant::Object(OBJECT_INVALID));
            self.emit_op(op::NEQUAL, aux::OBJECT_OBJECT);
            self.sp -= 4;
        }
        Ok(())
    }

    fn gen_const(&mut self, value: &Constant) {
        match value {
            Constant::Int(v) => {
                self.emit_op(op::CONST, aux::INT);
                self.emit_i32(*v);
                self.sp += 4;
            }
            Constant::Float(v) => {
                self.emit_op(op::CONST, aux::FLOAT);
                self.emit_f32(*v);
                self.sp += 4;
            }
            Constant::String(s) => {
                self.emit_op(op::CONST, aux::STRING);
                let bytes = nwscript_lexer::encode_str(s);
                self.emit_u16(bytes.len() as u16);
                self.code.extend_from_slice(&bytes);
                self.sp += 4;
            }
            Constant::Object(handle) => {
                self.emit_op(op::CONST, aux::OBJECT);
                self.emit_u32(*handle);
                self.sp += 4;
            }
            Constant::Vector(parts) => {
                for part in parts {
                    self.emit_op(op::CONST, aux::FLOAT);
                    self.emit_f32(*part);
                }
                self.sp += 12;
            }
        }
    }

    // === Variables ===

    fn local_slot(&self, symbol: SymbolId) -> Option<(i32, u16)> {
        self.locals
            .iter()
            .rev()
            .find(|slot| slot.symbol == symbol)
            .map(|slot| (slot.pos, slot.size))
    }

    fn gen_var_read(&mut self, symbol: SymbolId, span: Span) -> Result<(), Diagnostic> {
        if let Some((pos, size)) = self.local_slot(symbol) {
            self.emit_copy(op::CPTOPSP, (pos - size as i32) - self.sp, size);
            self.sp += size as i32;
            return Ok(());
        }
        if let Some(&(pos, size)) = self.global_pos.get(&symbol) {
            self.emit_copy(op::CPTOPBP, (pos - size as i32) - self.bp_size, size);
            self.sp += size as i32;
            return Ok(());
        }
        Err(self.missing_storage(symbol, span))
    }

    fn gen_component_read(
        &mut self,
        symbol: SymbolId,
        component: VecComponent,
        span: Span,
    ) -> Result<(), Diagnostic> {
        if let Some((pos, _)) = self.local_slot(symbol) {
            let offset = (pos - 12 + component.offset() as i32) - self.sp;
            self.emit_copy(op::CPTOPSP, offset, 4);
            self.sp += 4;
            return Ok(());
        }
        if let Some(&(pos, _)) = self.global_pos.get(&symbol) {
            let offset = (pos - 12 + component.offset() as i32) - self.bp_size;
            self.emit_copy(op::CPTOPBP, offset, 4);
            self.sp += 4;
            return Ok(());
        }
        Err(self.missing_storage(symbol, span))
    }

    /// Read the value an lvalue currently holds; returns its type.
    fn gen_lvalue_read(&mut self, target: &LValue) -> Result<Type, Diagnostic> {
        match target.component {
            Some(component) => {
                self.gen_component_read(target.symbol, component, target.span)?;
                Ok(Type::Float)
            }
            None => {
                self.gen_var_read(target.symbol, target.span)?;
                Ok(self.symbols.get(target.symbol).ty)
            }
        }
    }

    /// Store the value on top of the stack into an lvalue, leaving the
    /// value in place as the expression result.
    fn gen_lvalue_store(&mut self, target: &LValue) -> Result<(), Diagnostic> {
        let (copy_op, frame_end) = if self.local_slot(target.symbol).is_some() {
            (op::CPDOWNSP, self.sp)
        } else if self.global_pos.contains_key(&target.symbol) {
            (op::CPDOWNBP, self.bp_size)
        } else {
            return Err(self.missing_storage(target.symbol, target.span));
        };
        let (pos, size) = self
            .local_slot(target.symbol)
            .or_else(|| self.global_pos.get(&target.symbol).copied())
            .expect("storage located above");

        match target.component {
            Some(component) => {
                let offset = (pos - 12 + component.offset() as i32) - frame_end;
                self.emit_copy(copy_op, offset, 4);
            }
            None => {
                let offset = (pos - size as i32) - frame_end;
                self.emit_copy(copy_op, offset, size);
            }
        }
        Ok(())
    }

    fn gen_incdec(
        &mut self,
        target: &LValue,
        decrement: bool,
        postfix: bool,
    ) -> Result<(), Diagnostic> {
        let (local, pos) = if let Some((pos, _)) = self.local_slot(target.symbol) {
            (true, pos)
        } else if let Some(&(pos, _)) = self.global_pos.get(&target.symbol) {
            (false, pos)
        } else {
            return Err(self.missing_storage(target.symbol, target.span));
        };
        let inc_op = match (decrement, local) {
            (false, true) => op::INCISP,
            (true, true) => op::DECISP,
            (false, false) => op::INCIBP,
            (true, false) => op::DECIBP,
        };
        let copy_op = if local { op::CPTOPSP } else { op::CPTOPBP };

        let slot_offset = |sp: i32, frame: i32, local: bool| {
            if local {
                (pos - 4) - sp
            } else {
                (pos - 4) - frame
            }
        };

        if postfix {
            // Push the old value, then bump the variable in place.
            self.emit_copy(copy_op, slot_offset(self.sp, self.bp_size, local), 4);
            self.sp += 4;
            self.emit_op(inc_op, aux::INT);
            self.emit_i32(slot_offset(self.sp, self.bp_size, local));
        } else {
            self.emit_op(inc_op, aux::INT);
            self.emit_i32(slot_offset(self.sp, self.bp_size, local));
            self.emit_copy(copy_op, slot_offset(self.sp, self.bp_size, local), 4);
            self.sp += 4;
        }
        Ok(())
    }

    fn missing_storage(&self, symbol: SymbolId, span: Span) -> Diagnostic {
        Diagnostic::error(
            ErrorKind::Codegen,
            span,
            format!(
                "no storage for '{}' at this point",
                self.symbols.get(symbol).name
            ),
        )
    }

    // === Calls ===

    fn gen_call(&mut self, callee: SymbolId, args: &[Expr], span: Span) -> Result<(), Diagnostic> {
        let symbol = self.symbols.get(callee).clone();
        match symbol.kind {
            SymbolKind::Function {
                ref params,
                defined,
                ..
            } => {
                if !defined {
                    return Err(Diagnostic::error(
                        ErrorKind::Name,
                        span,
                        format!("function '{}' was declared but never defined", symbol.name),
                    ));
                }
                self.emit_return_slot(symbol.ty);

                let mut args_bytes = 0;
                for arg in args {
                    self.gen_expr(arg)?;
                    args_bytes += arg.ty.stack_size() as i32;
                }
                for param in params.iter().skip(args.len()) {
                    let default = param
                        .default
                        .clone()
                        .expect("arity checking filled trailing defaults");
                    self.gen_const(&default);
                    args_bytes += param.ty.stack_size() as i32;
                }

                let site = self.emit_jump(op::JSR);
                self.register_call_target(site, callee);
                // The callee pops its parameters; its return value now
                // occupies the reserved slot.
                self.sp -= args_bytes;
                Ok(())
            }
            SymbolKind::Action {
                id, ref params, ..
            } => {
                let ret_size = symbol.ty.stack_size() as i32;
                let mut args_bytes = 0;
                let mut argc = 0u8;
                for (index, arg) in args.iter().enumerate() {
                    if params.get(index).map(|p| p.ty) == Some(Type::Action) {
                        self.gen_action_closure(arg)?;
                    } else {
                        self.gen_expr(arg)?;
                        args_bytes += arg.ty.stack_size() as i32;
                    }
                    argc += 1;
                }
                for param in params.iter().skip(args.len()) {
                    let default = param
                        .default
                        .clone()
                        .expect("arity checking filled trailing defaults");
                    self.gen_const(&default);
                    args_bytes += param.ty.stack_size() as i32;
                    argc += 1;
                }

                self.emit_op(op::ACTION, aux::NONE);
                self.emit_u16(id);
                self.code.push(argc);
                self.sp -= args_bytes;
                self.sp += ret_size;
                Ok(())
            }
            _ => Err(Diagnostic::error(
                ErrorKind::Codegen,
                span,
                format!("'{}' is not callable", symbol.name),
            )),
        }
    }

    /// An `action` argument captures the program state and a deferred
    /// call body for the VM to rebind later. Occupies no stack space.
    fn gen_action_closure(&mut self, arg: &Expr) -> Result<(), Diagnostic> {
        self.emit_op(op::STORE_STATE, aux::STATE);
        self.emit_u32(self.bp_size as u32);
        self.emit_u32(self.sp as u32);
        let over = self.emit_jump(op::JMP);

        let sp_entry = self.sp;
        self.gen_expr(arg)?;
        if self.sp != sp_entry {
            return Err(Diagnostic::error(
                ErrorKind::Codegen,
                arg.span,
                "internal stack imbalance in deferred action",
            ));
        }
        self.emit_op(op::RETN, aux::NONE);
        let after = self.addr();
        self.patch_jump(over, after);
        Ok(())
    }

    fn emit_return_slot(&mut self, ty: Type) {
        match ty {
            Type::Void => {}
            Type::Vector => {
                for _ in 0..3 {
                    self.emit_op(op::RSADD, aux::FLOAT);
                }
                self.sp += 12;
            }
            Type::Engine(n) => {
                self.emit_op(op::RSADD, aux::ENGINE0 + n);
                self.sp += 4;
            }
            Type::Int => {
                self.emit_op(op::RSADD, aux::INT);
                self.sp += 4;
            }
            Type::Float => {
                self.emit_op(op::RSADD, aux::FLOAT);
                self.sp += 4;
            }
            Type::String => {
                self.emit_op(op::RSADD, aux::STRING);
                self.sp += 4;
            }
            Type::Object => {
                self.emit_op(op::RSADD, aux::OBJECT);
                self.sp += 4;
            }
            Type::Action => {}
        }
    }

    /// Reserve a default-initialized slot for an uninitialized variable.
    fn emit_default_slot(&mut self, ty: Type) {
        self.emit_return_slot(ty);
    }

    // === Emission helpers ===

    fn addr(&self) -> u32 {
        HEADER_SIZE + self.code.len() as u32
    }

    fn emit_op(&mut self, opcode: u8, aux_byte: u8) {
        self.code.push(opcode);
        self.code.push(aux_byte);
    }

    fn emit_u16(&mut self, v: u16) {
        self.code.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_i32(&mut self, v: i32) {
        self.code.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_u32(&mut self, v: u32) {
        self.code.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_f32(&mut self, v: f32) {
        self.code.extend_from_slice(&v.to_be_bytes());
    }

    /// Stack copy: opcode, aux STACK, i32 offset, u16 size.
    fn emit_copy(&mut self, opcode: u8, offset: i32, size: u16) {
        self.emit_op(opcode, aux::STACK);
        self.emit_i32(offset);
        self.emit_u16(size);
    }

    /// MOVSP that adjusts the simulated stack.
    fn emit_movsp(&mut self, delta: i32) {
        self.emit_movsp_raw(delta);
        self.sp += delta;
    }

    /// MOVSP on a control-flow edge that leaves the simulated stack
    /// untouched (the fall-through path keeps its depth).
    fn emit_movsp_raw(&mut self, delta: i32) {
        if delta == 0 {
            return;
        }
        self.emit_op(op::MOVSP, aux::NONE);
        self.emit_i32(delta);
    }

    /// Emit a jump with a placeholder displacement.
    fn emit_jump(&mut self, opcode: u8) -> JumpSite {
        let instr_addr = self.addr();
        self.emit_op(opcode, aux::NONE);
        let operand_at = self.code.len();
        self.emit_i32(0);
        JumpSite {
            operand_at,
            instr_addr,
        }
    }

    /// Patch a jump site with a displacement relative to the instruction.
    fn patch_jump(&mut self, site: JumpSite, target: u32) {
        let rel = target as i64 - site.instr_addr as i64;
        self.code[site.operand_at..site.operand_at + 4]
            .copy_from_slice(&(rel as i32).to_be_bytes());
    }

    /// Patch a call immediately when the callee is placed, otherwise
    /// queue a fixup and schedule generation.
    fn register_call_target(&mut self, site: JumpSite, target: SymbolId) {
        if let Some(&entry) = self.entries.get(&target) {
            self.patch_jump(site, entry);
        } else {
            self.fixups.push(CallFixup { site, target });
            self.pending.push_back(target);
        }
    }

    // === Debug records ===

    fn push_line_record(&mut self, span: Span, start: u32) {
        let end = self.addr();
        if end == start {
            return;
        }
        let (line, _) = self.sources.line_col(&span);
        self.debug.lines.push(LineRecord {
            file: span.file_id,
            line,
            start,
            end,
        });
    }

    fn push_var_record(&mut self, symbol: SymbolId, offset: i32, start: u32) -> usize {
        let s = self.symbols.get(symbol);
        self.debug.variables.push(VarRecord {
            name: s.name.to_string(),
            ty: s.ty,
            offset,
            start,
            end: 0,
        });
        self.debug.variables.len() - 1
    }
}

/// Collect the user-function callees of a block, for call-graph closure.
fn collect_block_calls(block: &Block, symbols: &SymbolTable, out: &mut Vec<SymbolId>) {
    for stmt in &block.stmts {
        collect_stmt_calls(stmt, symbols, out);
    }
}

fn collect_stmt_calls(stmt: &Stmt, symbols: &SymbolTable, out: &mut Vec<SymbolId>) {
    match stmt {
        Stmt::Empty | Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Expr(e) => collect_expr_calls(e, symbols, out),
        Stmt::Decl(decls) => {
            for decl in decls {
                if let Some(init) = &decl.init {
                    collect_expr_calls(init, symbols, out);
                }
            }
        }
        Stmt::Block(block) => collect_block_calls(block, symbols, out),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_expr_calls(cond, symbols, out);
            collect_stmt_calls(then_branch, symbols, out);
            if let Some(else_branch) = else_branch {
                collect_stmt_calls(else_branch, symbols, out);
            }
        }
        Stmt::While { cond, body } => {
            collect_expr_calls(cond, symbols, out);
            collect_stmt_calls(body, symbols, out);
        }
        Stmt::DoWhile { body, cond } => {
            collect_stmt_calls(body, symbols, out);
            collect_expr_calls(cond, symbols, out);
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            for e in [init, cond, step].into_iter().flatten() {
                collect_expr_calls(e, symbols, out);
            }
            collect_stmt_calls(body, symbols, out);
        }
        Stmt::Switch { value, cases, .. } => {
            collect_expr_calls(value, symbols, out);
            for case in cases {
                for stmt in &case.stmts {
                    collect_stmt_calls(stmt, symbols, out);
                }
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                collect_expr_calls(value, symbols, out);
            }
        }
    }
}

fn collect_expr_calls(expr: &Expr, symbols: &SymbolTable, out: &mut Vec<SymbolId>) {
    match &expr.kind {
        ExprKind::Constant(_) | ExprKind::Var(_) => {}
        ExprKind::VectorLit(parts) => {
            for part in parts {
                collect_expr_calls(part, symbols, out);
            }
        }
        ExprKind::Call { callee, args } => {
            if matches!(symbols.get(*callee).kind, SymbolKind::Function { .. }) {
                out.push(*callee);
            }
            for arg in args {
                collect_expr_calls(arg, symbols, out);
            }
        }
        ExprKind::Unary { operand, .. } => collect_expr_calls(operand, symbols, out),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_expr_calls(lhs, symbols, out);
            collect_expr_calls(rhs, symbols, out);
        }
        ExprKind::Assign { value, .. } => collect_expr_calls(value, symbols, out),
        ExprKind::IncDec { .. } => {}
        ExprKind::Ternary {
            cond,
            then_val,
            else_val,
        } => {
            collect_expr_calls(cond, symbols, out);
            collect_expr_calls(then_val, symbols, out);
            collect_expr_calls(else_val, symbols, out);
        }
        ExprKind::Member { base, .. } => collect_expr_calls(base, symbols, out),
        ExprKind::IntToFloat(inner) => collect_expr_calls(inner, symbols, out),
    }
}
