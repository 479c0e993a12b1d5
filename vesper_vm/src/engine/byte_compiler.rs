// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lowers the AST to executables. Each function gets a frame of local
//! slots for its declared names; locals that nested closures capture are
//! moved into a heap environment created at frame entry, and free names
//! resolve through the environment chain and finally the global object.

use super::bytecode::{Constant, EnvBinding, Executable, FunctionTemplate, Instruction, Opcode};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use vesper_parser::ast::{
    AssignmentOperator, AssignmentTarget, BinaryOperator, DeclarationKind, Expression, ForInit,
    ForTarget, Function, Literal, LogicalOperator, MemberExpression, MemberProperty, Program,
    PropertyName, Statement, UnaryOperator,
};

#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompileError: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

type Result<T> = std::result::Result<T, CompileError>;

/// Compiles a program into its root executable.
pub fn compile(program: &Program) -> Result<Rc<Executable>> {
    let mut compiler = ByteCompiler::new_root();
    compiler.emit_hoisted_declarations(&program.body)?;
    for statement in &program.body {
        compiler.emit_statement(statement)?;
    }
    compiler.emit_plain(Opcode::LoadResult);
    compiler.emit_plain(Opcode::Return);
    Ok(Rc::new(compiler.into_executable()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Param,
    Var,
    Let,
    Const,
    Function,
}

/// Static facts about one function scope: what it declares, what its inner
/// functions reach out for, and therefore what must live on the heap.
struct Analysis {
    declared: Vec<(Box<str>, DeclKind)>,
    captured: HashSet<Box<str>>,
    free: HashSet<Box<str>>,
}

fn analyze_function(params: &[Box<str>], body: &[Statement]) -> Analysis {
    let mut declared: Vec<(Box<str>, DeclKind)> = params
        .iter()
        .map(|name| (name.clone(), DeclKind::Param))
        .collect();
    let mut functions = Vec::new();
    collect_declarations(body, &mut declared, &mut functions);

    let declared_set: HashSet<Box<str>> =
        declared.iter().map(|(name, _)| name.clone()).collect();
    let mut refs = HashSet::new();
    let mut nested_free = HashSet::new();
    for statement in body {
        collect_statement_refs(statement, &mut refs, &mut nested_free);
    }

    let captured = declared_set
        .iter()
        .filter(|name| nested_free.contains(*name))
        .cloned()
        .collect();
    let mut free: HashSet<Box<str>> = refs.union(&nested_free).cloned().collect();
    free.retain(|name| !declared_set.contains(name));
    Analysis {
        declared,
        captured,
        free,
    }
}

fn note_declaration(declared: &mut Vec<(Box<str>, DeclKind)>, name: &str, kind: DeclKind) {
    if !declared.iter().any(|(existing, _)| &**existing == name) {
        declared.push((name.into(), kind));
    }
}

fn declaration_kind(kind: DeclarationKind) -> DeclKind {
    match kind {
        DeclarationKind::Var => DeclKind::Var,
        DeclarationKind::Let => DeclKind::Let,
        DeclarationKind::Const => DeclKind::Const,
    }
}

/// Hoisting pass: every `var`/`let`/`const`/`function` name declared
/// anywhere in the function body (blocks included, nested functions
/// excluded) belongs to the function scope.
fn collect_declarations<'a>(
    body: &'a [Statement],
    declared: &mut Vec<(Box<str>, DeclKind)>,
    functions: &mut Vec<&'a Function>,
) {
    for statement in body {
        collect_statement_declarations(statement, declared, functions, false);
    }
}

fn collect_statement_declarations<'a>(
    statement: &'a Statement,
    declared: &mut Vec<(Box<str>, DeclKind)>,
    functions: &mut Vec<&'a Function>,
    in_loop: bool,
) {
    // A loop body re-runs its declarations; a `const` there compiles as a
    // mutable binding because it is written once per iteration.
    let demote = |kind: DeclarationKind| -> DeclKind {
        match kind {
            DeclarationKind::Const if in_loop => DeclKind::Let,
            other => declaration_kind(other),
        }
    };
    match statement {
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarators {
                note_declaration(declared, &declarator.name, demote(decl.kind));
            }
        }
        Statement::FunctionDeclaration(function) => {
            if let Some(name) = &function.name {
                note_declaration(declared, name, DeclKind::Function);
            }
            functions.push(function);
        }
        Statement::Block(block) => {
            for statement in block {
                collect_statement_declarations(statement, declared, functions, in_loop);
            }
        }
        Statement::If(if_statement) => {
            collect_statement_declarations(&if_statement.consequent, declared, functions, in_loop);
            if let Some(alternate) = &if_statement.alternate {
                collect_statement_declarations(alternate, declared, functions, in_loop);
            }
        }
        Statement::While(while_statement) => {
            collect_statement_declarations(&while_statement.body, declared, functions, true);
        }
        Statement::For(for_statement) => {
            if let Some(ForInit::Declaration(decl)) = &for_statement.init {
                for declarator in &decl.declarators {
                    note_declaration(declared, &declarator.name, declaration_kind(decl.kind));
                }
            }
            collect_statement_declarations(&for_statement.body, declared, functions, true);
        }
        Statement::ForIn(for_in) => {
            if let ForTarget::Declaration { kind, name } = &for_in.left {
                // The loop binding itself is re-assigned every round.
                let kind = match kind {
                    DeclarationKind::Const => DeclKind::Let,
                    other => declaration_kind(*other),
                };
                note_declaration(declared, name, kind);
            }
            collect_statement_declarations(&for_in.body, declared, functions, true);
        }
        Statement::ForOf(for_of) => {
            if let ForTarget::Declaration { kind, name } = &for_of.left {
                let kind = match kind {
                    DeclarationKind::Const => DeclKind::Let,
                    other => declaration_kind(*other),
                };
                note_declaration(declared, name, kind);
            }
            collect_statement_declarations(&for_of.body, declared, functions, true);
        }
        Statement::Try(try_statement) => {
            if let Some(binding) = &try_statement.catch_binding {
                note_declaration(declared, binding, DeclKind::Var);
            }
            for statement in &try_statement.block {
                collect_statement_declarations(statement, declared, functions, in_loop);
            }
            for statement in &try_statement.catch_block {
                collect_statement_declarations(statement, declared, functions, in_loop);
            }
        }
        _ => {}
    }
}

fn collect_statement_refs(
    statement: &Statement,
    refs: &mut HashSet<Box<str>>,
    nested_free: &mut HashSet<Box<str>>,
) {
    match statement {
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarators {
                if let Some(init) = &declarator.init {
                    collect_expression_refs(init, refs, nested_free);
                }
            }
        }
        Statement::FunctionDeclaration(function) => {
            let analysis = analyze_function(&function.params, &function.body);
            nested_free.extend(analysis.free);
        }
        Statement::Block(block) => {
            for statement in block {
                collect_statement_refs(statement, refs, nested_free);
            }
        }
        Statement::Expression(expression) | Statement::Throw(expression) => {
            collect_expression_refs(expression, refs, nested_free);
        }
        Statement::If(if_statement) => {
            collect_expression_refs(&if_statement.test, refs, nested_free);
            collect_statement_refs(&if_statement.consequent, refs, nested_free);
            if let Some(alternate) = &if_statement.alternate {
                collect_statement_refs(alternate, refs, nested_free);
            }
        }
        Statement::While(while_statement) => {
            collect_expression_refs(&while_statement.test, refs, nested_free);
            collect_statement_refs(&while_statement.body, refs, nested_free);
        }
        Statement::For(for_statement) => {
            match &for_statement.init {
                Some(ForInit::Declaration(decl)) => {
                    for declarator in &decl.declarators {
                        if let Some(init) = &declarator.init {
                            collect_expression_refs(init, refs, nested_free);
                        }
                    }
                }
                Some(ForInit::Expression(expression)) => {
                    collect_expression_refs(expression, refs, nested_free);
                }
                None => {}
            }
            if let Some(test) = &for_statement.test {
                collect_expression_refs(test, refs, nested_free);
            }
            if let Some(update) = &for_statement.update {
                collect_expression_refs(update, refs, nested_free);
            }
            collect_statement_refs(&for_statement.body, refs, nested_free);
        }
        Statement::ForIn(for_in) => {
            if let ForTarget::Identifier(name) = &for_in.left {
                refs.insert(name.clone());
            }
            collect_expression_refs(&for_in.object, refs, nested_free);
            collect_statement_refs(&for_in.body, refs, nested_free);
        }
        Statement::ForOf(for_of) => {
            if let ForTarget::Identifier(name) = &for_of.left {
                refs.insert(name.clone());
            }
            collect_expression_refs(&for_of.iterable, refs, nested_free);
            collect_statement_refs(&for_of.body, refs, nested_free);
        }
        Statement::Return(Some(expression)) => {
            collect_expression_refs(expression, refs, nested_free);
        }
        Statement::Try(try_statement) => {
            if let Some(binding) = &try_statement.catch_binding {
                refs.insert(binding.clone());
            }
            for statement in &try_statement.block {
                collect_statement_refs(statement, refs, nested_free);
            }
            for statement in &try_statement.catch_block {
                collect_statement_refs(statement, refs, nested_free);
            }
        }
        Statement::Return(None) | Statement::Break | Statement::Continue | Statement::Empty => {}
    }
}

fn collect_expression_refs(
    expression: &Expression,
    refs: &mut HashSet<Box<str>>,
    nested_free: &mut HashSet<Box<str>>,
) {
    match expression {
        Expression::Identifier(name) => {
            refs.insert(name.clone());
        }
        Expression::Literal(_) | Expression::This => {}
        Expression::Binary(binary) => {
            collect_expression_refs(&binary.left, refs, nested_free);
            collect_expression_refs(&binary.right, refs, nested_free);
        }
        Expression::Logical(logical) => {
            collect_expression_refs(&logical.left, refs, nested_free);
            collect_expression_refs(&logical.right, refs, nested_free);
        }
        Expression::Unary(unary) => collect_expression_refs(&unary.operand, refs, nested_free),
        Expression::Update(update) => match &update.target {
            AssignmentTarget::Identifier(name) => {
                refs.insert(name.clone());
            }
            AssignmentTarget::Member(member) => {
                collect_member_refs(member, refs, nested_free);
            }
        },
        Expression::Assignment(assignment) => {
            match &assignment.target {
                AssignmentTarget::Identifier(name) => {
                    refs.insert(name.clone());
                }
                AssignmentTarget::Member(member) => {
                    collect_member_refs(member, refs, nested_free);
                }
            }
            collect_expression_refs(&assignment.value, refs, nested_free);
        }
        Expression::Conditional(conditional) => {
            collect_expression_refs(&conditional.test, refs, nested_free);
            collect_expression_refs(&conditional.consequent, refs, nested_free);
            collect_expression_refs(&conditional.alternate, refs, nested_free);
        }
        Expression::Call(call) => {
            collect_expression_refs(&call.callee, refs, nested_free);
            for argument in &call.arguments {
                collect_expression_refs(argument, refs, nested_free);
            }
        }
        Expression::New(new) => {
            collect_expression_refs(&new.callee, refs, nested_free);
            for argument in &new.arguments {
                collect_expression_refs(argument, refs, nested_free);
            }
        }
        Expression::Member(member) | Expression::Delete(member) => {
            collect_member_refs(member, refs, nested_free);
        }
        Expression::Array(elements) => {
            for element in elements.iter().flatten() {
                collect_expression_refs(element, refs, nested_free);
            }
        }
        Expression::Object(properties) => {
            for property in properties {
                if let PropertyName::Computed(key) = &property.key {
                    collect_expression_refs(key, refs, nested_free);
                }
                collect_expression_refs(&property.value, refs, nested_free);
            }
        }
        Expression::Function(function) => {
            let analysis = analyze_function(&function.params, &function.body);
            nested_free.extend(analysis.free);
        }
        Expression::Await(operand) => collect_expression_refs(operand, refs, nested_free),
        Expression::Yield(Some(operand)) => collect_expression_refs(operand, refs, nested_free),
        Expression::Yield(None) => {}
    }
}

fn collect_member_refs(
    member: &MemberExpression,
    refs: &mut HashSet<Box<str>>,
    nested_free: &mut HashSet<Box<str>>,
) {
    collect_expression_refs(&member.object, refs, nested_free);
    if let MemberProperty::Computed(key) = &member.property {
        collect_expression_refs(key, refs, nested_free);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Plain,
    ForOf,
    ForIn,
}

#[derive(Debug)]
struct LoopContext {
    kind: LoopKind,
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
    /// Depths outside the loop, for break/continue cleanup.
    iter_depth: u32,
    for_in_depth: u32,
    handler_depth: u32,
}

#[derive(Debug)]
pub struct ByteCompiler {
    instructions: Vec<Instruction>,
    constants: Vec<Constant>,
    names: Vec<Box<str>>,
    templates: Vec<Rc<FunctionTemplate>>,
    local_count: u32,
    slots: HashMap<Box<str>, u32>,
    is_root: bool,
    loops: Vec<LoopContext>,
    iter_depth: u32,
    for_in_depth: u32,
    handler_depth: u32,
    scratch_pool: Vec<u32>,
}

impl ByteCompiler {
    fn new_root() -> Self {
        Self {
            instructions: Vec::new(),
            constants: Vec::new(),
            names: Vec::new(),
            templates: Vec::new(),
            local_count: 0,
            slots: HashMap::new(),
            is_root: true,
            loops: Vec::new(),
            iter_depth: 0,
            for_in_depth: 0,
            handler_depth: 0,
            scratch_pool: Vec::new(),
        }
    }

    fn into_executable(self) -> Executable {
        Executable {
            instructions: self.instructions,
            constants: self.constants,
            names: self.names,
            templates: self.templates,
            local_count: self.local_count,
        }
    }

    // ### Emission helpers

    fn emit_plain(&mut self, opcode: Opcode) {
        self.instructions.push(Instruction::plain(opcode));
    }

    fn emit(&mut self, opcode: Opcode, a: u32) {
        self.instructions.push(Instruction::new(opcode, a));
    }

    /// Emits a branch with a dummy target; returns the index for patching.
    fn emit_jump(&mut self, opcode: Opcode) -> usize {
        let index = self.instructions.len();
        self.instructions.push(Instruction::new(opcode, u32::MAX));
        index
    }

    fn patch_jump(&mut self, index: usize) {
        self.instructions[index].a = self.instructions.len() as u32;
    }

    fn patch_jump_to(&mut self, index: usize, target: usize) {
        self.instructions[index].a = target as u32;
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    fn add_constant(&mut self, constant: Constant) -> u32 {
        if let Some(index) = self.constants.iter().position(|c| *c == constant) {
            return index as u32;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    fn add_name(&mut self, name: &str) -> u32 {
        if let Some(index) = self.names.iter().position(|n| &**n == name) {
            return index as u32;
        }
        self.names.push(name.into());
        (self.names.len() - 1) as u32
    }

    fn emit_constant(&mut self, constant: Constant) {
        let index = self.add_constant(constant);
        self.emit(Opcode::LoadConstant, index);
    }

    fn emit_undefined(&mut self) {
        self.emit_constant(Constant::Undefined);
    }

    fn number_constant(value: f64) -> Constant {
        if value.trunc() == value
            && value >= f64::from(i32::MIN)
            && value <= f64::from(i32::MAX)
            && !(value == 0.0 && value.is_sign_negative())
        {
            Constant::Integer(value as i32)
        } else {
            Constant::Float(value)
        }
    }

    fn alloc_scratch(&mut self) -> u32 {
        if let Some(slot) = self.scratch_pool.pop() {
            slot
        } else {
            let slot = self.local_count;
            self.local_count += 1;
            slot
        }
    }

    fn free_scratch(&mut self, slot: u32) {
        self.scratch_pool.push(slot);
    }

    // ### Name access

    fn emit_load_binding(&mut self, name: &str) {
        if let Some(slot) = self.slots.get(name) {
            self.emit(Opcode::LoadLocal, *slot);
        } else {
            let index = self.add_name(name);
            self.emit(Opcode::LoadScope, index);
        }
    }

    fn emit_store_binding(&mut self, name: &str) {
        if let Some(slot) = self.slots.get(name) {
            self.emit(Opcode::StoreLocal, *slot);
        } else {
            let index = self.add_name(name);
            self.emit(Opcode::StoreScope, index);
        }
    }

    // ### Declarations

    /// Frame prologue: root declarations are ensured on the global object,
    /// and hoisted function declarations are created and bound in source
    /// order.
    fn emit_hoisted_declarations(&mut self, body: &[Statement]) -> Result<()> {
        let mut declared = Vec::new();
        let mut functions = Vec::new();
        collect_declarations(body, &mut declared, &mut functions);
        if self.is_root {
            for (name, kind) in &declared {
                if *kind != DeclKind::Function {
                    let index = self.add_name(name);
                    self.emit(Opcode::DeclareGlobal, index);
                }
            }
        }
        for function in functions {
            let name = function.name.clone().unwrap_or_default();
            self.emit_closure(function)?;
            self.emit_store_binding(&name);
        }
        Ok(())
    }

    fn emit_closure(&mut self, function: &Function) -> Result<()> {
        let template = compile_function(function)?;
        let index = self.templates.len() as u32;
        let opcode = if template.is_async {
            Opcode::CreateAsyncClosure
        } else {
            Opcode::CreateClosure
        };
        self.templates.push(template);
        self.emit(opcode, index);
        Ok(())
    }

    // ### Statements

    fn emit_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarators {
                    if let Some(init) = &declarator.init {
                        self.emit_expression(init)?;
                        self.emit_store_binding(&declarator.name);
                    }
                }
            }
            // Hoisted in the prologue.
            Statement::FunctionDeclaration(_) => {}
            Statement::Block(body) => {
                for statement in body {
                    self.emit_statement(statement)?;
                }
            }
            Statement::Expression(expression) => {
                self.emit_expression(expression)?;
                if self.is_root {
                    self.emit_plain(Opcode::StoreResult);
                } else {
                    self.emit_plain(Opcode::Pop);
                }
            }
            Statement::If(if_statement) => {
                self.emit_expression(&if_statement.test)?;
                let to_else = self.emit_jump(Opcode::JumpIfFalse);
                self.emit_statement(&if_statement.consequent)?;
                if let Some(alternate) = &if_statement.alternate {
                    let to_end = self.emit_jump(Opcode::Jump);
                    self.patch_jump(to_else);
                    self.emit_statement(alternate)?;
                    self.patch_jump(to_end);
                } else {
                    self.patch_jump(to_else);
                }
            }
            Statement::While(while_statement) => {
                let test = self.here();
                self.emit_expression(&while_statement.test)?;
                let exit = self.emit_jump(Opcode::JumpIfFalse);
                self.push_loop(LoopKind::Plain);
                self.emit_statement(&while_statement.body)?;
                self.emit(Opcode::Jump, test as u32);
                self.patch_jump(exit);
                self.pop_loop(test);
            }
            Statement::For(for_statement) => self.emit_for(for_statement)?,
            Statement::ForIn(for_in) => self.emit_for_in(for_in)?,
            Statement::ForOf(for_of) => self.emit_for_of(for_of)?,
            Statement::Return(argument) => {
                if self.is_root {
                    return Err(CompileError {
                        message: "return outside of function".to_string(),
                    });
                }
                match argument {
                    Some(expression) => self.emit_expression(expression)?,
                    None => self.emit_undefined(),
                }
                // The frame is going away; run the iterator cleanup contract
                // for every loop still open in it.
                for _ in 0..self.iter_depth {
                    self.emit_plain(Opcode::IteratorClose);
                }
                for _ in 0..self.for_in_depth {
                    self.emit_plain(Opcode::ForInEnd);
                }
                self.emit_plain(Opcode::Return);
            }
            Statement::Break => {
                let (iter_depth, for_in_depth, handler_depth) = {
                    let context = self.loops.last().ok_or_else(|| CompileError {
                        message: "break outside of loop".to_string(),
                    })?;
                    (
                        context.iter_depth,
                        context.for_in_depth,
                        context.handler_depth,
                    )
                };
                for _ in handler_depth..self.handler_depth {
                    self.emit_plain(Opcode::PopExceptionHandler);
                }
                for _ in iter_depth..self.iter_depth {
                    self.emit_plain(Opcode::IteratorClose);
                }
                for _ in for_in_depth..self.for_in_depth {
                    self.emit_plain(Opcode::ForInEnd);
                }
                let jump = self.emit_jump(Opcode::Jump);
                self.loops.last_mut().unwrap().break_jumps.push(jump);
            }
            Statement::Continue => {
                let (kind, iter_depth, for_in_depth, handler_depth) = {
                    let context = self.loops.last().ok_or_else(|| CompileError {
                        message: "continue outside of loop".to_string(),
                    })?;
                    (
                        context.kind,
                        context.iter_depth,
                        context.for_in_depth,
                        context.handler_depth,
                    )
                };
                for _ in handler_depth..self.handler_depth {
                    self.emit_plain(Opcode::PopExceptionHandler);
                }
                // Keep the loop's own iterator alive; close anything opened
                // deeper inside the body.
                let keep_iter = iter_depth + u32::from(kind == LoopKind::ForOf);
                let keep_for_in = for_in_depth + u32::from(kind == LoopKind::ForIn);
                for _ in keep_iter..self.iter_depth {
                    self.emit_plain(Opcode::IteratorClose);
                }
                for _ in keep_for_in..self.for_in_depth {
                    self.emit_plain(Opcode::ForInEnd);
                }
                let jump = self.emit_jump(Opcode::Jump);
                self.loops.last_mut().unwrap().continue_jumps.push(jump);
            }
            Statement::Throw(expression) => {
                self.emit_expression(expression)?;
                self.emit_plain(Opcode::Throw);
            }
            Statement::Try(try_statement) => {
                let handler = self.emit_jump(Opcode::PushExceptionHandler);
                self.handler_depth += 1;
                for statement in &try_statement.block {
                    self.emit_statement(statement)?;
                }
                self.handler_depth -= 1;
                self.emit_plain(Opcode::PopExceptionHandler);
                let to_end = self.emit_jump(Opcode::Jump);
                self.patch_jump(handler);
                // The thrown value is on the operand stack.
                match &try_statement.catch_binding {
                    Some(binding) => self.emit_store_binding(binding),
                    None => self.emit_plain(Opcode::Pop),
                }
                for statement in &try_statement.catch_block {
                    self.emit_statement(statement)?;
                }
                self.patch_jump(to_end);
            }
            Statement::Empty => {}
        }
        Ok(())
    }

    fn push_loop(&mut self, kind: LoopKind) {
        let (iter_adjust, for_in_adjust) = match kind {
            LoopKind::ForOf => (1, 0),
            LoopKind::ForIn => (0, 1),
            LoopKind::Plain => (0, 0),
        };
        self.loops.push(LoopContext {
            kind,
            break_jumps: Vec::new(),
            continue_jumps: Vec::new(),
            iter_depth: self.iter_depth - iter_adjust,
            for_in_depth: self.for_in_depth - for_in_adjust,
            handler_depth: self.handler_depth,
        });
    }

    /// Ends the innermost loop: break jumps land here, continue jumps land
    /// on `continue_target`.
    fn pop_loop(&mut self, continue_target: usize) {
        let context = self.loops.pop().unwrap();
        for jump in context.break_jumps {
            self.patch_jump(jump);
        }
        for jump in context.continue_jumps {
            self.patch_jump_to(jump, continue_target);
        }
    }

    fn emit_for(&mut self, for_statement: &vesper_parser::ast::ForStatement) -> Result<()> {
        match &for_statement.init {
            Some(ForInit::Declaration(decl)) => {
                for declarator in &decl.declarators {
                    if let Some(init) = &declarator.init {
                        self.emit_expression(init)?;
                        self.emit_store_binding(&declarator.name);
                    }
                }
            }
            Some(ForInit::Expression(expression)) => {
                self.emit_expression(expression)?;
                self.emit_plain(Opcode::Pop);
            }
            None => {}
        }
        let test = self.here();
        let exit = match &for_statement.test {
            Some(expression) => {
                self.emit_expression(expression)?;
                Some(self.emit_jump(Opcode::JumpIfFalse))
            }
            None => None,
        };
        self.push_loop(LoopKind::Plain);
        self.emit_statement(&for_statement.body)?;
        let update = self.here();
        if let Some(expression) = &for_statement.update {
            self.emit_expression(expression)?;
            self.emit_plain(Opcode::Pop);
        }
        self.emit(Opcode::Jump, test as u32);
        if let Some(exit) = exit {
            self.patch_jump(exit);
        }
        self.pop_loop(update);
        Ok(())
    }

    fn emit_for_target_store(&mut self, target: &ForTarget) {
        let name = match target {
            ForTarget::Declaration { name, .. } => name,
            ForTarget::Identifier(name) => name,
        };
        let name = name.clone();
        self.emit_store_binding(&name);
    }

    fn emit_for_in(&mut self, for_in: &vesper_parser::ast::ForInStatement) -> Result<()> {
        self.emit_expression(&for_in.object)?;
        self.emit_plain(Opcode::ForInStart);
        self.for_in_depth += 1;
        let head = self.here();
        let exit = self.emit_jump(Opcode::ForInNext);
        self.emit_for_target_store(&for_in.left);
        self.push_loop(LoopKind::ForIn);
        self.emit_statement(&for_in.body)?;
        self.emit(Opcode::Jump, head as u32);
        self.patch_jump(exit);
        self.pop_loop(head);
        self.for_in_depth -= 1;
        Ok(())
    }

    fn emit_for_of(&mut self, for_of: &vesper_parser::ast::ForOfStatement) -> Result<()> {
        self.emit_expression(&for_of.iterable)?;
        self.emit_plain(if for_of.is_await {
            Opcode::GetAsyncIterator
        } else {
            Opcode::GetIterator
        });
        self.iter_depth += 1;
        let head = self.here();
        let exit = if for_of.is_await {
            self.emit_plain(Opcode::ForAwaitNext);
            self.emit_plain(Opcode::Await);
            let exit = self.emit_jump(Opcode::IteratorUnpack);
            // The unpacked value may itself be a promise (a sync iterable of
            // promises); settle it before binding the loop variable.
            self.emit_plain(Opcode::Await);
            exit
        } else {
            self.emit_jump(Opcode::ForOfNext)
        };
        self.emit_for_target_store(&for_of.left);
        self.push_loop(LoopKind::ForOf);
        self.emit_statement(&for_of.body)?;
        self.emit(Opcode::Jump, head as u32);
        self.patch_jump(exit);
        self.pop_loop(head);
        self.iter_depth -= 1;
        Ok(())
    }

    // ### Expressions

    fn emit_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Literal(literal) => {
                let constant = match literal {
                    Literal::Null => Constant::Null,
                    Literal::Boolean(value) => Constant::Boolean(*value),
                    Literal::Number(value) => Self::number_constant(*value),
                    Literal::String(units) => Constant::String(Rc::from(units.as_slice())),
                };
                self.emit_constant(constant);
            }
            Expression::Identifier(name) => {
                let name = name.clone();
                self.emit_load_binding(&name);
            }
            Expression::This => self.emit_plain(Opcode::LoadThis),
            Expression::Binary(binary) => {
                self.emit_expression(&binary.left)?;
                self.emit_expression(&binary.right)?;
                match binary.operator {
                    BinaryOperator::Add => self.emit_plain(Opcode::Add),
                    BinaryOperator::Sub => self.emit_plain(Opcode::Sub),
                    BinaryOperator::Mul => self.emit_plain(Opcode::Mul),
                    BinaryOperator::Div => self.emit_plain(Opcode::Div),
                    BinaryOperator::Mod => self.emit_plain(Opcode::Mod),
                    BinaryOperator::Lt => self.emit_plain(Opcode::Lt),
                    BinaryOperator::Le => self.emit_plain(Opcode::Le),
                    BinaryOperator::Gt => self.emit_plain(Opcode::Gt),
                    BinaryOperator::Ge => self.emit_plain(Opcode::Ge),
                    BinaryOperator::Eq => self.emit_plain(Opcode::Eq),
                    BinaryOperator::StrictEq => self.emit_plain(Opcode::StrictEq),
                    BinaryOperator::Ne => {
                        self.emit_plain(Opcode::Eq);
                        self.emit_plain(Opcode::Not);
                    }
                    BinaryOperator::StrictNe => {
                        self.emit_plain(Opcode::StrictEq);
                        self.emit_plain(Opcode::Not);
                    }
                }
            }
            Expression::Logical(logical) => {
                self.emit_expression(&logical.left)?;
                self.emit_plain(Opcode::Dup);
                let short_circuit = self.emit_jump(match logical.operator {
                    LogicalOperator::And => Opcode::JumpIfFalse,
                    LogicalOperator::Or => Opcode::JumpIfTrue,
                });
                self.emit_plain(Opcode::Pop);
                self.emit_expression(&logical.right)?;
                self.patch_jump(short_circuit);
            }
            Expression::Unary(unary) => {
                if unary.operator == UnaryOperator::TypeOf {
                    if let Expression::Identifier(name) = &*unary.operand {
                        let index = self.add_name(name);
                        self.emit(Opcode::TypeofScope, index);
                        return Ok(());
                    }
                }
                self.emit_expression(&unary.operand)?;
                match unary.operator {
                    UnaryOperator::Not => self.emit_plain(Opcode::Not),
                    UnaryOperator::Neg => self.emit_plain(Opcode::Neg),
                    UnaryOperator::Plus => self.emit_plain(Opcode::Plus),
                    UnaryOperator::TypeOf => self.emit_plain(Opcode::TypeofValue),
                }
            }
            Expression::Update(update) => self.emit_update(update)?,
            Expression::Assignment(assignment) => self.emit_assignment(assignment)?,
            Expression::Conditional(conditional) => {
                self.emit_expression(&conditional.test)?;
                let to_else = self.emit_jump(Opcode::JumpIfFalse);
                self.emit_expression(&conditional.consequent)?;
                let to_end = self.emit_jump(Opcode::Jump);
                self.patch_jump(to_else);
                self.emit_expression(&conditional.alternate)?;
                self.patch_jump(to_end);
            }
            Expression::Call(call) => {
                match &*call.callee {
                    // Method calls keep the receiver as `this`.
                    Expression::Member(member) => {
                        self.emit_expression(&member.object)?;
                        self.emit_plain(Opcode::Dup);
                        match &member.property {
                            MemberProperty::Dot(name) => {
                                let index = self.add_name(name);
                                self.emit(Opcode::GetProperty, index);
                            }
                            MemberProperty::Computed(key) => {
                                self.emit_expression(key)?;
                                self.emit_plain(Opcode::GetPropertyComputed);
                            }
                        }
                        for argument in &call.arguments {
                            self.emit_expression(argument)?;
                        }
                        self.emit(Opcode::CallMethod, call.arguments.len() as u32);
                    }
                    _ => {
                        self.emit_expression(&call.callee)?;
                        for argument in &call.arguments {
                            self.emit_expression(argument)?;
                        }
                        self.emit(Opcode::Call, call.arguments.len() as u32);
                    }
                }
            }
            Expression::New(new) => {
                self.emit_expression(&new.callee)?;
                for argument in &new.arguments {
                    self.emit_expression(argument)?;
                }
                self.emit(Opcode::New, new.arguments.len() as u32);
            }
            Expression::Member(member) => {
                self.emit_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Dot(name) => {
                        let index = self.add_name(name);
                        self.emit(Opcode::GetProperty, index);
                    }
                    MemberProperty::Computed(key) => {
                        self.emit_expression(key)?;
                        self.emit_plain(Opcode::GetPropertyComputed);
                    }
                }
            }
            Expression::Delete(member) => {
                self.emit_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Dot(name) => {
                        let index = self.add_name(name);
                        self.emit(Opcode::DeleteProperty, index);
                    }
                    MemberProperty::Computed(key) => {
                        self.emit_expression(key)?;
                        self.emit_plain(Opcode::DeletePropertyComputed);
                    }
                }
            }
            Expression::Array(elements) => {
                for element in elements {
                    match element {
                        Some(expression) => self.emit_expression(expression)?,
                        None => self.emit_undefined(),
                    }
                }
                self.emit(Opcode::NewArray, elements.len() as u32);
            }
            Expression::Object(properties) => {
                self.emit_plain(Opcode::NewObject);
                for property in properties {
                    self.emit_plain(Opcode::Dup);
                    match &property.key {
                        PropertyName::Identifier(name) => {
                            let index = self.add_name(name);
                            self.emit_expression(&property.value)?;
                            self.emit(Opcode::SetProperty, index);
                        }
                        PropertyName::String(units) => {
                            let name = String::from_utf16_lossy(units);
                            let index = self.add_name(&name);
                            self.emit_expression(&property.value)?;
                            self.emit(Opcode::SetProperty, index);
                        }
                        PropertyName::Number(value) => {
                            let name =
                                crate::ecmascript::abstract_operations::type_conversion::number_to_string(
                                    *value,
                                );
                            let index = self.add_name(&name);
                            self.emit_expression(&property.value)?;
                            self.emit(Opcode::SetProperty, index);
                        }
                        PropertyName::Computed(key) => {
                            self.emit_expression(key)?;
                            self.emit_expression(&property.value)?;
                            self.emit_plain(Opcode::SetPropertyComputed);
                        }
                    }
                    self.emit_plain(Opcode::Pop);
                }
            }
            Expression::Function(function) => self.emit_closure(function)?,
            Expression::Await(operand) => {
                self.emit_expression(operand)?;
                self.emit_plain(Opcode::Await);
            }
            Expression::Yield(operand) => {
                match operand {
                    Some(expression) => self.emit_expression(expression)?,
                    None => self.emit_undefined(),
                }
                self.emit_plain(Opcode::Yield);
            }
        }
        Ok(())
    }

    fn emit_arith(&mut self, operator: AssignmentOperator) {
        match operator {
            AssignmentOperator::Add => self.emit_plain(Opcode::Add),
            AssignmentOperator::Sub => self.emit_plain(Opcode::Sub),
            AssignmentOperator::Mul => self.emit_plain(Opcode::Mul),
            AssignmentOperator::Div => self.emit_plain(Opcode::Div),
            AssignmentOperator::Mod => self.emit_plain(Opcode::Mod),
            AssignmentOperator::Assign => unreachable!(),
        }
    }

    fn emit_assignment(
        &mut self,
        assignment: &vesper_parser::ast::AssignmentExpression,
    ) -> Result<()> {
        match (&assignment.target, assignment.operator) {
            (AssignmentTarget::Identifier(name), AssignmentOperator::Assign) => {
                let name = name.clone();
                self.emit_expression(&assignment.value)?;
                self.emit_plain(Opcode::Dup);
                self.emit_store_binding(&name);
            }
            (AssignmentTarget::Identifier(name), operator) => {
                let name = name.clone();
                self.emit_load_binding(&name);
                self.emit_expression(&assignment.value)?;
                self.emit_arith(operator);
                self.emit_plain(Opcode::Dup);
                self.emit_store_binding(&name);
            }
            (AssignmentTarget::Member(member), AssignmentOperator::Assign) => {
                self.emit_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Dot(name) => {
                        let index = self.add_name(name);
                        self.emit_expression(&assignment.value)?;
                        self.emit(Opcode::SetProperty, index);
                    }
                    MemberProperty::Computed(key) => {
                        self.emit_expression(key)?;
                        self.emit_expression(&assignment.value)?;
                        self.emit_plain(Opcode::SetPropertyComputed);
                    }
                }
            }
            (AssignmentTarget::Member(member), operator) => match &member.property {
                MemberProperty::Dot(name) => {
                    let index = self.add_name(name);
                    self.emit_expression(&member.object)?;
                    self.emit_plain(Opcode::Dup);
                    self.emit(Opcode::GetProperty, index);
                    self.emit_expression(&assignment.value)?;
                    self.emit_arith(operator);
                    self.emit(Opcode::SetProperty, index);
                }
                MemberProperty::Computed(key) => {
                    let key_slot = self.alloc_scratch();
                    let value_slot = self.alloc_scratch();
                    self.emit_expression(&member.object)?;
                    self.emit_expression(key)?;
                    self.emit(Opcode::StoreLocal, key_slot);
                    self.emit_plain(Opcode::Dup);
                    self.emit(Opcode::LoadLocal, key_slot);
                    self.emit_plain(Opcode::GetPropertyComputed);
                    self.emit_expression(&assignment.value)?;
                    self.emit_arith(operator);
                    self.emit(Opcode::StoreLocal, value_slot);
                    self.emit(Opcode::LoadLocal, key_slot);
                    self.emit(Opcode::LoadLocal, value_slot);
                    self.emit_plain(Opcode::SetPropertyComputed);
                    self.free_scratch(value_slot);
                    self.free_scratch(key_slot);
                }
            },
        }
        Ok(())
    }

    fn emit_update(&mut self, update: &vesper_parser::ast::UpdateExpression) -> Result<()> {
        let step = Constant::Integer(1);
        let arith = if update.is_increment {
            Opcode::Add
        } else {
            Opcode::Sub
        };
        match &update.target {
            AssignmentTarget::Identifier(name) => {
                let name = name.clone();
                self.emit_load_binding(&name);
                self.emit_plain(Opcode::Plus);
                if update.is_prefix {
                    self.emit_constant(step);
                    self.emit_plain(arith);
                    self.emit_plain(Opcode::Dup);
                    self.emit_store_binding(&name);
                } else {
                    self.emit_plain(Opcode::Dup);
                    self.emit_constant(step);
                    self.emit_plain(arith);
                    self.emit_store_binding(&name);
                }
            }
            AssignmentTarget::Member(member) => {
                let old_slot = self.alloc_scratch();
                match &member.property {
                    MemberProperty::Dot(name) => {
                        let index = self.add_name(name);
                        self.emit_expression(&member.object)?;
                        self.emit_plain(Opcode::Dup);
                        self.emit(Opcode::GetProperty, index);
                        self.emit_plain(Opcode::Plus);
                        self.emit(Opcode::StoreLocal, old_slot);
                        self.emit(Opcode::LoadLocal, old_slot);
                        self.emit_constant(step.clone());
                        self.emit_plain(arith);
                        self.emit(Opcode::SetProperty, index);
                        self.emit_plain(Opcode::Pop);
                    }
                    MemberProperty::Computed(key) => {
                        let key_slot = self.alloc_scratch();
                        self.emit_expression(&member.object)?;
                        self.emit_expression(key)?;
                        self.emit(Opcode::StoreLocal, key_slot);
                        self.emit_plain(Opcode::Dup);
                        self.emit(Opcode::LoadLocal, key_slot);
                        self.emit_plain(Opcode::GetPropertyComputed);
                        self.emit_plain(Opcode::Plus);
                        self.emit(Opcode::StoreLocal, old_slot);
                        self.emit(Opcode::LoadLocal, key_slot);
                        self.emit(Opcode::LoadLocal, old_slot);
                        self.emit_constant(step.clone());
                        self.emit_plain(arith);
                        self.emit_plain(Opcode::SetPropertyComputed);
                        self.emit_plain(Opcode::Pop);
                        self.free_scratch(key_slot);
                    }
                }
                if update.is_prefix {
                    self.emit(Opcode::LoadLocal, old_slot);
                    self.emit_constant(step);
                    self.emit_plain(arith);
                } else {
                    self.emit(Opcode::LoadLocal, old_slot);
                }
                self.free_scratch(old_slot);
            }
        }
        Ok(())
    }
}

/// Compiles one function literal into a template.
fn compile_function(function: &Function) -> Result<Rc<FunctionTemplate>> {
    let analysis = analyze_function(&function.params, &function.body);

    // Captured names and `const` declarations live in the frame's heap
    // environment; everything else gets a slot.
    let mut env_bindings: Vec<EnvBinding> = Vec::new();
    let mut env_names: HashSet<Box<str>> = HashSet::new();
    for (name, kind) in &analysis.declared {
        if analysis.captured.contains(name) || *kind == DeclKind::Const {
            env_names.insert(name.clone());
            env_bindings.push(EnvBinding {
                name: name.clone(),
                mutable: *kind != DeclKind::Const,
            });
        }
    }

    let mut slots = HashMap::new();
    let mut local_count = function.params.len() as u32;
    for (index, name) in function.params.iter().enumerate() {
        if !env_names.contains(name) {
            slots.insert(name.clone(), index as u32);
        }
    }
    for (name, kind) in &analysis.declared {
        if *kind == DeclKind::Param || env_names.contains(name) {
            continue;
        }
        slots.insert(name.clone(), local_count);
        local_count += 1;
    }

    let captured_params = function
        .params
        .iter()
        .enumerate()
        .filter_map(|(param_index, name)| {
            env_bindings
                .iter()
                .position(|binding| binding.name == *name)
                .map(|env_index| (param_index as u32, env_index as u32))
        })
        .collect();

    let mut compiler = ByteCompiler {
        instructions: Vec::new(),
        constants: Vec::new(),
        names: Vec::new(),
        templates: Vec::new(),
        local_count,
        slots,
        is_root: false,
        loops: Vec::new(),
        iter_depth: 0,
        for_in_depth: 0,
        handler_depth: 0,
        scratch_pool: Vec::new(),
    };
    compiler.emit_hoisted_declarations(&function.body)?;
    for statement in &function.body {
        compiler.emit_statement(statement)?;
    }
    compiler.emit_undefined();
    compiler.emit_plain(Opcode::Return);

    let executable = Rc::new(compiler.into_executable());
    Ok(Rc::new(FunctionTemplate {
        name: function.name.clone().unwrap_or_default(),
        param_count: function.params.len() as u32,
        is_async: function.is_async,
        is_generator: function.is_generator,
        is_arrow: function.is_arrow,
        env_bindings,
        captured_params,
        executable,
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use vesper_parser::parse;

    fn compile_source(source: &str) -> Rc<Executable> {
        compile(&parse(source).unwrap()).unwrap()
    }

    #[test]
    fn return_outside_function_is_a_compile_error() {
        let program = parse("return 1;").unwrap();
        assert!(compile(&program).is_err());
    }

    #[test]
    fn script_ends_with_completion_value() {
        let executable = compile_source("1 + 2;");
        let tail: Vec<Opcode> = executable
            .instructions
            .iter()
            .rev()
            .take(3)
            .map(|instruction| instruction.opcode)
            .collect();
        assert_eq!(tail, vec![Opcode::Return, Opcode::LoadResult, Opcode::StoreResult]);
    }

    #[test]
    fn functions_get_local_slots() {
        let executable = compile_source("function f(a, b) { var c = a + b; return c; }");
        let template = &executable.templates[0];
        assert_eq!(template.param_count, 2);
        assert_eq!(template.executable.local_count, 3);
        assert!(template.env_bindings.is_empty());
    }

    #[test]
    fn captured_locals_move_to_the_environment() {
        let executable =
            compile_source("function counter(start) { return function () { start = start + 1; return start; }; }");
        let template = &executable.templates[0];
        assert_eq!(template.env_bindings.len(), 1);
        assert_eq!(&*template.env_bindings[0].name, "start");
        assert_eq!(template.captured_params, vec![(0, 0)]);
    }

    #[test]
    fn const_declarations_are_immutable_bindings() {
        let executable = compile_source("function f() { const a = 1; return a; }");
        let template = &executable.templates[0];
        assert_eq!(template.env_bindings.len(), 1);
        assert!(!template.env_bindings[0].mutable);
    }

    #[test]
    fn async_templates_use_the_async_closure_opcode() {
        let executable = compile_source("async function f() { return await 1; }");
        assert!(executable
            .instructions
            .iter()
            .any(|instruction| instruction.opcode == Opcode::CreateAsyncClosure));
        assert!(executable.templates[0].is_async);
        assert!(executable.templates[0]
            .executable
            .instructions
            .iter()
            .any(|instruction| instruction.opcode == Opcode::Await));
    }

    #[test]
    fn constants_are_deduplicated() {
        let executable = compile_source("1; 1; 1.5; 'a'; 'a';");
        let integers = executable
            .constants
            .iter()
            .filter(|constant| matches!(constant, Constant::Integer(1)))
            .count();
        assert_eq!(integers, 1);
    }
}
